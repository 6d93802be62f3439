//! React component context
//!
//! Maps a selected host element to the component that rendered it (name and source
//! location). Introspection goes through [`ComponentContextProvider`]; without
//! instrumentation every lookup resolves to `None`.

use crate::dom::{HostDocument, NodeId};
use crate::error::Result;
use crate::protocol::{ReactSelectionContext, SelectionFramework};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Arc;

const NEXT_INTERNAL_COMPONENT_NAMES: &[&str] = &[
    "InnerLayoutRouter",
    "RedirectErrorBoundary",
    "RedirectBoundary",
    "HTTPAccessFallbackErrorBoundary",
    "HTTPAccessFallbackBoundary",
    "LoadingBoundary",
    "ErrorBoundary",
    "InnerScrollAndFocusHandler",
    "ScrollAndFocusHandler",
    "RenderFromTemplateContext",
    "OuterLayoutRouter",
    "AppRouter",
    "ServerRoot",
    "HotReload",
    "Router",
    "html",
    "body",
];

const REACT_INTERNAL_COMPONENT_NAMES: &[&str] =
    &["Suspense", "Fragment", "StrictMode", "Profiler", "SuspenseList"];

const SOURCE_FILE_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx", ".mjs", ".cjs", ".mdx"];

const BUNDLER_PREFIXES: &[&str] =
    &["webpack-internal:///", "webpack:///", "turbopack:///", "file://"];

/// One frame of a component owner stack
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackFrame {
    pub function_name: Option<String>,
    pub file_name: Option<String>,
    pub line_number: Option<u32>,
    pub column_number: Option<u32>,
}

impl StackFrame {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self { function_name: Some(function_name.into()), ..Default::default() }
    }

    pub fn with_location(
        mut self,
        file_name: impl Into<String>,
        line_number: u32,
        column_number: u32,
    ) -> Self {
        self.file_name = Some(file_name.into());
        self.line_number = Some(line_number);
        self.column_number = Some(column_number);
        self
    }
}

/// Component-instrumentation capability of the host page
#[async_trait]
pub trait ComponentContextProvider: Send + Sync {
    fn is_instrumentation_active(&self) -> bool;

    /// Owner stack of the component that rendered `node`, innermost frame first.
    /// `Ok(None)` when the node has no associated fiber.
    async fn owner_stack(&self, node: NodeId) -> Result<Option<Vec<StackFrame>>>;

    /// Display names of composite ancestors of the node's fiber, nearest first
    fn composite_ancestor_names(&self, node: NodeId) -> Vec<String>;

    fn is_source_file(&self, file_name: &str) -> bool {
        let path = file_name.split(['?', '#']).next().unwrap_or_default();
        !path.contains("node_modules")
            && !path.contains("/_next/static/chunks/")
            && SOURCE_FILE_EXTENSIONS.iter().any(|extension| path.ends_with(extension))
    }

    fn normalize_file_name(&self, file_name: &str) -> String {
        let mut normalized = file_name.split(['?', '#']).next().unwrap_or_default();
        for prefix in BUNDLER_PREFIXES {
            if let Some(rest) = normalized.strip_prefix(prefix) {
                normalized = rest;
            }
        }
        if normalized.starts_with('(') {
            if let Some((_, rest)) = normalized.split_once(")/") {
                normalized = rest;
            }
        }
        normalized.trim_start_matches("./").to_string()
    }
}

/// Provider for pages without component instrumentation
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopContextProvider;

#[async_trait]
impl ComponentContextProvider for NoopContextProvider {
    fn is_instrumentation_active(&self) -> bool {
        false
    }

    async fn owner_stack(&self, _node: NodeId) -> Result<Option<Vec<StackFrame>>> {
        Ok(None)
    }

    fn composite_ancestor_names(&self, _node: NodeId) -> Vec<String> {
        Vec::new()
    }
}

type StackFuture = Shared<BoxFuture<'static, Option<Vec<StackFrame>>>>;

/// Resolves [`ReactSelectionContext`] for selected elements.
///
/// Owner-stack lookups are memoized per node as shared futures, so concurrent and repeated
/// resolutions of the same element query the provider once.
pub struct ReactContextResolver<P: ComponentContextProvider + 'static> {
    provider: Arc<P>,
    stacks: HashMap<NodeId, StackFuture>,
}

impl<P: ComponentContextProvider + 'static> ReactContextResolver<P> {
    pub fn new(provider: P) -> Self {
        Self { provider: Arc::new(provider), stacks: HashMap::new() }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn cached_nodes(&self) -> usize {
        self.stacks.len()
    }

    /// Resolve the component context of `node`. Never fails: lookup errors and missing
    /// instrumentation resolve to `None`.
    pub fn resolve(
        &mut self,
        node: NodeId,
        is_next_project: bool,
    ) -> BoxFuture<'static, Option<ReactSelectionContext>> {
        if !self.provider.is_instrumentation_active() {
            return futures::future::ready(None).boxed();
        }

        let stack = self.owner_stack(node);
        let provider = Arc::clone(&self.provider);

        async move {
            let stack = stack.await;
            let stack = stack.as_deref();

            let component_name = component_name_from_stack(stack).or_else(|| {
                provider
                    .composite_ancestor_names(node)
                    .into_iter()
                    .find(|name| is_useful_component_name(name))
            });

            let source_frame = stack.and_then(|frames| {
                frames.iter().find(|frame| {
                    frame
                        .file_name
                        .as_deref()
                        .is_some_and(|file_name| provider.is_source_file(file_name))
                })
            });
            let file_path = source_frame
                .and_then(|frame| frame.file_name.as_deref())
                .map(|file_name| provider.normalize_file_name(file_name));

            if component_name.is_none() && file_path.is_none() {
                return None;
            }

            Some(ReactSelectionContext {
                component_name,
                file_path,
                line_number: source_frame.and_then(|frame| frame.line_number),
                column_number: source_frame.and_then(|frame| frame.column_number),
                framework: if is_next_project {
                    SelectionFramework::Nextjs
                } else {
                    SelectionFramework::React
                },
            })
        }
        .boxed()
    }

    /// Drop cached lookups for nodes that left the document
    pub fn evict_disconnected<D: HostDocument + ?Sized>(&mut self, doc: &D) {
        let before = self.stacks.len();
        self.stacks.retain(|node, _| doc.is_connected(*node));
        let evicted = before - self.stacks.len();
        if evicted > 0 {
            log::trace!("Evicted {} cached owner stacks", evicted);
        }
    }

    fn owner_stack(&mut self, node: NodeId) -> StackFuture {
        if let Some(cached) = self.stacks.get(&node) {
            return cached.clone();
        }

        let provider = Arc::clone(&self.provider);
        let future = async move {
            match provider.owner_stack(node).await {
                Ok(stack) => stack,
                Err(e) => {
                    log::debug!("Owner stack lookup failed for {:?}: {}", node, e);
                    None
                }
            }
        }
        .boxed()
        .shared();

        self.stacks.insert(node, future.clone());
        future
    }
}

/// Whether the document was rendered by Next.js
pub fn is_next_project<D: HostDocument + ?Sized>(doc: &D) -> bool {
    doc.query_selector("#__NEXT_DATA__").ok().flatten().is_some()
        || doc.query_selector("nextjs-portal").ok().flatten().is_some()
}

fn is_internal_component_name(name: &str) -> bool {
    name.starts_with('_')
        || NEXT_INTERNAL_COMPONENT_NAMES.contains(&name)
        || REACT_INTERNAL_COMPONENT_NAMES.contains(&name)
}

fn is_source_component_name(name: &str) -> bool {
    name.len() > 1
        && name.starts_with(|c: char| c.is_ascii_uppercase())
        && !is_internal_component_name(name)
        && !name.starts_with("Primitive.")
        && !(name.contains("Provider") && name.contains("Context"))
}

fn is_useful_component_name(name: &str) -> bool {
    !name.is_empty()
        && !is_internal_component_name(name)
        && !name.starts_with("Primitive.")
        && name != "Slot"
        && name != "SlotClone"
}

fn component_name_from_stack(stack: Option<&[StackFrame]>) -> Option<String> {
    stack?
        .iter()
        .filter_map(|frame| frame.function_name.as_deref())
        .find(|name| is_source_component_name(name))
        .map(str::to_string)
}
