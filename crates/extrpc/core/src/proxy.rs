use std::{collections::BTreeMap, fmt, rc::Rc};

use extrpc_primitives::{CallPath, Error, Reply, Request, Result, Shape, ShapeNode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};

use crate::HostChannel;

/// Caller-side mirror of a remote function tree.
///
/// Built by [`Proxy::connect`], which asks the background context for its
/// function skeleton once. The tree does not change afterwards; reconnect to
/// pick up a different registry.
pub struct Proxy<C> {
    channel: Rc<C>,
    shape: Shape,
    root: ProxyGroup<C>,
}

/// A named grouping of remote functions
pub struct ProxyGroup<C> {
    entries: BTreeMap<String, ProxyNode<C>>,
}

/// One entry of a proxy tree
pub enum ProxyNode<C> {
    /// A callable leaf
    Function(RemoteFunction<C>),
    /// A nested group
    Group(ProxyGroup<C>),
}

/// A callable leaf of the proxy tree
pub struct RemoteFunction<C> {
    path: CallPath,
    channel: Rc<C>,
}

impl<C: HostChannel> Proxy<C> {
    /// Discovers the remote function tree over `channel` and mirrors it.
    ///
    /// Fails when the bootstrap message fails or its answer is not a
    /// function skeleton; there is no retry.
    pub async fn connect(channel: C) -> Result<Self> {
        let channel = Rc::new(channel);

        debug!("Requesting remote function list");
        let response = channel
            .send_message(Request::FunctionList.to_value())
            .await?;
        let shape = Shape::try_from(Reply::from_value(response)?.into_result()?)?;
        debug!(functions = shape.leaf_paths().len(), "Received remote function list");

        let root = ProxyGroup::mirror(&shape, None, &channel);
        Ok(Self {
            channel,
            shape,
            root,
        })
    }

    /// The discovered skeleton
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Full paths of every remote function
    pub fn paths(&self) -> Vec<CallPath> {
        self.shape.leaf_paths()
    }

    /// The top level of the tree
    pub fn root(&self) -> &ProxyGroup<C> {
        &self.root
    }

    /// Looks up a top-level entry
    pub fn get(&self, name: &str) -> Option<&ProxyNode<C>> {
        self.root.get(name)
    }

    /// Looks up the function at `path`
    pub fn function(&self, path: &str) -> Result<&RemoteFunction<C>> {
        let path = CallPath::parse(path)?;
        let unknown = || Error::UnknownFunction {
            path: path.to_string(),
        };

        let mut group = &self.root;
        let (last, parents) = path.segments().split_last().ok_or_else(unknown)?;
        for segment in parents {
            group = match group.get(segment) {
                Some(ProxyNode::Group(inner)) => inner,
                _ => return Err(unknown()),
            };
        }

        match group.get(last) {
            Some(ProxyNode::Function(function)) => Ok(function),
            Some(ProxyNode::Group(_)) => Err(Error::NotCallable {
                path: path.to_string(),
            }),
            None => Err(unknown()),
        }
    }

    /// Calls the function at `path`
    pub async fn call(&self, path: &str, params: Vec<Value>) -> Result<Value> {
        self.function(path)?.call(params).await
    }

    /// Sends an arbitrary message and settles on the reply envelope.
    ///
    /// This is how messages reach the dispatcher's custom handler.
    pub async fn send(&self, message: Value) -> Result<Value> {
        trace!(%message, "Sending raw message");
        let response = self.channel.send_message(message).await?;
        Reply::from_value(response)?.into_result()
    }
}

impl<C: HostChannel> ProxyGroup<C> {
    fn mirror(shape: &Shape, prefix: Option<&CallPath>, channel: &Rc<C>) -> Self {
        let entries = shape
            .iter()
            .map(|(name, node)| {
                let path = match prefix {
                    Some(prefix) => prefix.child(name.as_str()),
                    None => CallPath::root(name.as_str()),
                };
                let node = match node {
                    ShapeNode::Function => ProxyNode::Function(RemoteFunction {
                        path,
                        channel: channel.clone(),
                    }),
                    ShapeNode::Group(group) => {
                        ProxyNode::Group(Self::mirror(group, Some(&path), channel))
                    }
                };
                (name.clone(), node)
            })
            .collect();
        Self { entries }
    }
}

impl<C> ProxyGroup<C> {
    /// Looks up a direct child
    pub fn get(&self, name: &str) -> Option<&ProxyNode<C>> {
        self.entries.get(name)
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProxyNode<C>)> {
        self.entries.iter()
    }
}

impl<C> ProxyNode<C> {
    /// Looks up a child when this node is a group
    pub fn get(&self, name: &str) -> Option<&ProxyNode<C>> {
        match self {
            Self::Group(group) => group.get(name),
            Self::Function(_) => None,
        }
    }

    /// The function, when this node is a leaf
    pub fn as_function(&self) -> Option<&RemoteFunction<C>> {
        match self {
            Self::Function(function) => Some(function),
            Self::Group(_) => None,
        }
    }
}

impl<C: HostChannel> RemoteFunction<C> {
    /// Full path of this function
    pub fn path(&self) -> &CallPath {
        &self.path
    }

    /// Invokes the remote function with `params`
    pub async fn call(&self, params: Vec<Value>) -> Result<Value> {
        let request = Request::call(self.path.to_string(), params);
        trace!(path = %self.path, "Calling remote function");
        let response = self.channel.send_message(request.to_value()).await?;
        Reply::from_value(response)?.into_result()
    }

    /// Invokes the remote function and deserializes its result
    pub async fn call_as<T: DeserializeOwned>(&self, params: Vec<Value>) -> Result<T> {
        let value = self.call(params).await?;
        serde_json::from_value(value).map_err(Error::from)
    }
}

impl<C> Clone for RemoteFunction<C> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            channel: self.channel.clone(),
        }
    }
}

impl<C> fmt::Debug for Proxy<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy").field("root", &self.root).finish()
    }
}

impl<C> fmt::Debug for ProxyGroup<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<C> fmt::Debug for ProxyNode<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(function) => fmt::Debug::fmt(function, f),
            Self::Group(group) => fmt::Debug::fmt(group, f),
        }
    }
}

impl<C> fmt::Debug for RemoteFunction<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteFunction({})", self.path)
    }
}
