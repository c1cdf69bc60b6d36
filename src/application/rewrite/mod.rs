//! DOM subset and rewrite pass applied to a fetched page before rendering.

mod containerize;
mod urls;

pub use containerize::{ContainerizeError, MAX_CLIMBS, containerize};
pub use urls::{Reference, ReferenceError, absolutize_value};

use kuchiki::{NodeRef, traits::TendrilSink};
use thiserror::Error;
use tracing::warn;

use crate::domain::params::RenderParams;

const SOURCE: &str = "webclip::application::rewrite";

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("no result elements for given selectors")]
    NoExtractionResult,
    #[error("failed to isolate selected content: {0}")]
    Containerize(#[from] ContainerizeError),
    #[error("document origin `{origin}` is not a valid reference: {source}")]
    Origin {
        origin: String,
        #[source]
        source: ReferenceError,
    },
    #[error("failed to serialize rewritten document: {0}")]
    Serialize(#[from] std::io::Error),
}

/// Apply the configured transformations to `html` fetched from `origin` and serialize
/// the result.
pub fn rewrite_document(
    html: &str,
    origin: &str,
    params: &RenderParams,
) -> Result<String, RewriteError> {
    let origin_ref = Reference::parse(origin).map_err(|source| RewriteError::Origin {
        origin: origin.to_string(),
        source,
    })?;

    let document = kuchiki::parse_html().one(html);
    let body = first_match(&document, "body").ok_or(RewriteError::NoExtractionResult)?;

    if let Some(query) = RenderParams::selector(&params.query) {
        subset(
            &document,
            &body,
            query,
            RenderParams::enabled(params.with_containers),
        )?;
    }

    if let Some(remove) = RenderParams::selector(&params.remove) {
        for node in select_nodes(&document, remove, "remove") {
            node.detach();
        }
    }

    if RenderParams::enabled(params.force_image_loading) {
        materialize_images(&document);
    }

    if let Some(head) = first_match(&document, "head") {
        let breaks = [
            (&params.no_break_before, "before"),
            (&params.no_break_inside, "inside"),
            (&params.no_break_after, "after"),
        ];
        for (selector, position) in breaks {
            if let Some(selector) = RenderParams::selector(selector) {
                inject_style(
                    &head,
                    &format!(
                        "{selector}{{page-break-{position}:avoid!important;break-{position}:avoid-page!important}}"
                    ),
                );
            }
        }

        if let Some(styles) = RenderParams::selector(&params.custom_styles) {
            inject_style(&head, styles);
        }
    }

    absolutize_links(&document, &origin_ref);

    if !body.children().any(|child| child.as_element().is_some()) {
        return Err(RewriteError::NoExtractionResult);
    }

    let mut buffer = Vec::with_capacity(html.len());
    document.serialize(&mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn first_match(document: &NodeRef, selector: &str) -> Option<NodeRef> {
    document
        .select_first(selector)
        .ok()
        .map(|element| element.as_node().clone())
}

/// Nodes matching `selector` in document order. An unparseable selector matches nothing.
fn select_nodes(document: &NodeRef, selector: &str, field: &'static str) -> Vec<NodeRef> {
    match document.select(selector) {
        Ok(matches) => matches.map(|element| element.as_node().clone()).collect(),
        Err(()) => {
            warn!(
                target = SOURCE,
                field,
                selector,
                "Selector could not be parsed; treating it as matching nothing"
            );
            Vec::new()
        }
    }
}

fn subset(
    document: &NodeRef,
    body: &NodeRef,
    query: &str,
    with_containers: bool,
) -> Result<(), RewriteError> {
    let matches = select_nodes(document, query, "query");

    if matches
        .iter()
        .any(|node| node == body || body.ancestors().any(|ancestor| ancestor == *node))
    {
        return Ok(());
    }

    let outermost: Vec<NodeRef> = matches
        .iter()
        .filter(|node| !node.ancestors().any(|ancestor| matches.contains(&ancestor)))
        .cloned()
        .collect();

    let retained = if with_containers {
        containerize(outermost, body)?
    } else {
        outermost
    };

    let previous: Vec<NodeRef> = body.children().collect();
    for child in previous {
        child.detach();
    }
    for node in retained {
        body.append(node);
    }
    Ok(())
}

fn materialize_images(document: &NodeRef) {
    for image in select_nodes(document, "img", "force_image_loading") {
        let Some(element) = image.as_element() else {
            continue;
        };
        let deferred = element
            .attributes
            .borrow()
            .get("data-src")
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        if let Some(deferred) = deferred {
            element.attributes.borrow_mut().insert("src", deferred);
        }
    }
}

/// Append `css` to `head` as a new `<style>` element.
fn inject_style(head: &NodeRef, css: &str) {
    let fragment = kuchiki::parse_html().one(format!("<style>{css}</style>"));
    let Some(fragment_head) = first_match(&fragment, "head") else {
        return;
    };
    let injected: Vec<NodeRef> = fragment_head.children().collect();
    for node in injected {
        head.append(node);
    }
}

fn absolutize_links(document: &NodeRef, origin: &Reference) {
    for node in select_nodes(document, "[href],[src]", "links") {
        let Some(element) = node.as_element() else {
            continue;
        };
        for attribute in ["href", "src"] {
            let rewritten = element
                .attributes
                .borrow()
                .get(attribute)
                .and_then(|value| absolutize_value(value, origin));
            if let Some(rewritten) = rewritten {
                element.attributes.borrow_mut().insert(attribute, rewritten);
            }
        }
    }
}
