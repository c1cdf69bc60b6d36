use kuchiki::NodeRef;
use thiserror::Error;

/// Upper bound on the number of ancestors climbed from one selected node.
pub const MAX_CLIMBS: usize = 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContainerizeError {
    #[error("containerization climbed more than {limit} ancestors")]
    BoundExceeded { limit: usize },
    #[error("selected node is not inside the container root")]
    OutsideRoot,
}

/// Keep the ancestor chain from `root` down to every node of `selection` and prune
/// everything else hanging off that chain. Returns the outermost containers, the direct
/// children of `root`, in selection order.
///
/// `selection` must not contain a node together with one of its descendants.
pub fn containerize(
    selection: Vec<NodeRef>,
    root: &NodeRef,
) -> Result<Vec<NodeRef>, ContainerizeError> {
    let mut containers: Vec<NodeRef> = Vec::new();
    let mut outermost: Vec<NodeRef> = Vec::new();

    for node in &selection {
        let mut current = node.clone();
        let mut climbs = 0;
        loop {
            let parent = current.parent().ok_or(ContainerizeError::OutsideRoot)?;
            if parent == *root {
                if !outermost.contains(&current) {
                    outermost.push(current);
                }
                break;
            }

            climbs += 1;
            if climbs > MAX_CLIMBS {
                return Err(ContainerizeError::BoundExceeded { limit: MAX_CLIMBS });
            }
            if !containers.contains(&parent) {
                containers.push(parent.clone());
            }
            current = parent;
        }
    }

    for container in &containers {
        let strays: Vec<NodeRef> = container
            .children()
            .filter(|child| !containers.contains(child) && !selection.contains(child))
            .collect();
        for stray in strays {
            stray.detach();
        }
    }

    Ok(outermost)
}

#[cfg(test)]
mod tests {
    use kuchiki::traits::TendrilSink;

    use super::*;

    fn body_of(document: &NodeRef) -> NodeRef {
        document
            .select_first("body")
            .expect("body")
            .as_node()
            .clone()
    }

    fn select(document: &NodeRef, selector: &str) -> Vec<NodeRef> {
        document
            .select(selector)
            .expect("valid selector")
            .map(|element| element.as_node().clone())
            .collect()
    }

    fn markup(node: &NodeRef) -> String {
        let mut buffer = Vec::new();
        node.serialize(&mut buffer).expect("serialize");
        String::from_utf8(buffer).expect("utf-8")
    }

    #[test]
    fn keeps_ancestor_chain_and_drops_siblings() {
        let document = kuchiki::parse_html().one(
            "<body><nav>menu</nav><div class=\"outer\"><aside>ad</aside>\
             <section><p id=\"target\">keep</p><p>drop</p></section></div></body>",
        );
        let body = body_of(&document);

        let containers =
            containerize(select(&document, "#target"), &body).expect("within bound");

        assert_eq!(containers.len(), 1);
        assert_eq!(
            markup(&containers[0]),
            "<div class=\"outer\"><section><p id=\"target\">keep</p></section></div>"
        );
    }

    #[test]
    fn siblings_that_both_match_share_a_container() {
        let document = kuchiki::parse_html().one(
            "<body><div><p class=\"k\">a</p><p>x</p><p class=\"k\">b</p></div><div>y</div></body>",
        );
        let body = body_of(&document);

        let containers = containerize(select(&document, ".k"), &body).expect("within bound");

        assert_eq!(containers.len(), 1);
        assert_eq!(
            markup(&containers[0]),
            "<div><p class=\"k\">a</p><p class=\"k\">b</p></div>"
        );
    }

    #[test]
    fn selections_at_different_depths_keep_both_chains() {
        let document = kuchiki::parse_html().one(
            "<body><div><p id=\"shallow\">a</p><section><p id=\"deep\">b</p><p>x</p></section>\
             <p>y</p></div><footer>f</footer></body>",
        );
        let body = body_of(&document);

        let containers =
            containerize(select(&document, "#shallow, #deep"), &body).expect("within bound");

        assert_eq!(containers.len(), 1);
        assert_eq!(
            markup(&containers[0]),
            "<div><p id=\"shallow\">a</p><section><p id=\"deep\">b</p></section></div>"
        );
    }

    #[test]
    fn direct_children_of_root_need_no_climbing() {
        let document = kuchiki::parse_html().one("<body><main>m</main><footer>f</footer></body>");
        let body = body_of(&document);

        let containers = containerize(select(&document, "main"), &body).expect("within bound");

        assert_eq!(containers.len(), 1);
        assert_eq!(markup(&containers[0]), "<main>m</main>");
        assert_eq!(body.children().count(), 2, "root is not pruned");
    }

    #[test]
    fn empty_selection_is_returned_unchanged() {
        let document = kuchiki::parse_html().one("<body><p>x</p></body>");
        let body = body_of(&document);

        assert!(containerize(Vec::new(), &body).expect("nothing to climb").is_empty());
    }

    #[test]
    fn nodes_outside_root_are_rejected() {
        let document =
            kuchiki::parse_html().one("<html><head><title>t</title></head><body></body></html>");
        let body = body_of(&document);

        let err = containerize(select(&document, "title"), &body).expect_err("not under body");
        assert_eq!(err, ContainerizeError::OutsideRoot);
    }

    #[test]
    fn deep_nesting_hits_the_bound() {
        let document = kuchiki::parse_html().one("<body><div id=\"top\"></div></body>");
        let body = body_of(&document);
        let mut leaf = select(&document, "#top").remove(0);
        for _ in 0..=MAX_CLIMBS {
            let child = NodeRef::new_text("");
            leaf.append(child.clone());
            leaf = child;
        }

        let err = containerize(vec![leaf], &body).expect_err("too deep");
        assert_eq!(err, ContainerizeError::BoundExceeded { limit: MAX_CLIMBS });
    }
}
