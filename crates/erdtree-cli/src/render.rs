//! Plain-text rendering for terminal output.

use std::collections::HashMap;
use std::sync::Arc;

use erdtree_kernel::{Branch, BranchId, ContextWindow, ConversationTree, Node, NodeId};

/// Forest as an ASCII tree, one line per node, branch labels at heads.
///
/// A run of only children stays at one indent level; connectors appear only
/// where a node has more than one child.
pub fn format_tree(tree: &ConversationTree, branches: &[Branch], max_depth: Option<usize>) -> Vec<String> {
    let labels: HashMap<BranchId, &str> = branches.iter().map(|b| (b.id, b.label.as_str())).collect();
    let mut lines = Vec::new();
    for root in &tree.roots {
        format_chain(tree, &labels, *root, 0, String::new(), "", max_depth, &mut lines);
    }
    lines
}

/// Render the chain starting at `id`. `lead` prefixes its first line and
/// `indent` every line after it.
#[allow(clippy::too_many_arguments)]
fn format_chain(
    tree: &ConversationTree,
    labels: &HashMap<BranchId, &str>,
    mut id: NodeId,
    mut depth: usize,
    mut lead: String,
    indent: &str,
    max_depth: Option<usize>,
    lines: &mut Vec<String>,
) {
    loop {
        if max_depth.is_some_and(|max| depth > max) {
            return;
        }
        let Some(node) = tree.get(id) else {
            return;
        };

        let mut line = format!(
            "{lead}{} [{}] \"{}\"",
            id.short(),
            node.role,
            summarize(node.content.as_str(), 40)
        );
        let heads: Vec<&str> = tree
            .branches_at(id)
            .iter()
            .filter_map(|b| labels.get(b).copied())
            .collect();
        if !heads.is_empty() {
            line.push_str(&format!("  <- {}", heads.join(", ")));
        }
        lines.push(line);

        match tree.children_of(id) {
            [] => return,
            [only] => {
                id = *only;
                depth += 1;
                lead = indent.to_string();
            }
            children => {
                for (i, child) in children.iter().enumerate() {
                    let last = i == children.len() - 1;
                    let (connector, rest) = if last { ("└─ ", "   ") } else { ("├─ ", "│  ") };
                    format_chain(
                        tree,
                        labels,
                        *child,
                        depth + 1,
                        format!("{indent}{connector}"),
                        &format!("{indent}{rest}"),
                        max_depth,
                        lines,
                    );
                }
                return;
            }
        }
    }
}

/// One line per message, oldest first.
pub fn format_history(history: &[Arc<Node>]) -> Vec<String> {
    history
        .iter()
        .map(|n| format!("{} {:>9}: {}", n.id.short(), n.role.as_str(), summarize(n.content.as_str(), 72)))
        .collect()
}

/// Branch listing with fork provenance.
pub fn format_branches(branches: &[Branch]) -> Vec<String> {
    branches
        .iter()
        .map(|b| {
            let origin = match b.fork_point {
                Some(fp) => {
                    let source = branches
                        .iter()
                        .find(|s| s.id == fp.branch_id)
                        .map(|s| s.display_name())
                        .unwrap_or_else(|| fp.branch_id.short());
                    format!("  (from {source} @ {})", fp.node_id.short())
                }
                None => String::new(),
            };
            format!("{} {:<16} head {}{}", b.id.short(), b.display_name(), b.head_id.short(), origin)
        })
        .collect()
}

pub fn format_context(window: &ContextWindow) -> Vec<String> {
    let mut lines = format_history(&window.messages);
    lines.push(format!(
        "-- {} messages, {} dropped, ~{} tokens",
        window.len(),
        window.dropped,
        window.estimated_tokens
    ));
    lines
}

/// First line of `content`, trimmed and cut to `max_chars`.
fn summarize(content: &str, max_chars: usize) -> String {
    let first = content.lines().next().unwrap_or("").trim();
    if first.chars().count() <= max_chars {
        first.to_string()
    } else {
        let cut: String = first.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erdtree_kernel::{Engine, ErdConfig, Role};

    #[test]
    fn test_summarize() {
        assert_eq!(summarize("short", 10), "short");
        assert_eq!(summarize("first\nsecond", 10), "first");
        assert_eq!(summarize("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn test_tree_lines() {
        let engine = Engine::in_memory(ErdConfig::default()).unwrap();
        let ctl = engine.controller();
        let (_, main) = ctl.create_root(Role::System, "hello").unwrap();
        let n1 = ctl.append_message(main.id, Role::User, "hi").unwrap();
        ctl.append_message(main.id, Role::Assistant, "hi there").unwrap();
        ctl.append_message(main.id, Role::User, "thanks").unwrap();
        let side = ctl.fork_branch(main.id, n1.id, Some("side".into())).unwrap();
        ctl.append_message(side.id, Role::Assistant, "hey").unwrap();

        let branches = engine.branches().list();
        let lines = format_tree(&engine.tree(), &branches, None);
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("[system] \"hello\""));
        assert!(lines[1].contains("[user] \"hi\""));
        assert!(!lines[1].starts_with(' '));
        assert!(lines[2].starts_with("├─ "));
        assert!(lines[2].contains("\"hi there\""));
        // Only-child continuation keeps the sibling rail, no extra step.
        assert!(lines[3].starts_with("│  "));
        assert!(lines[3].ends_with("<- main"));
        assert!(lines[4].starts_with("└─ "));
        assert!(lines[4].ends_with("<- side"));

        let shallow = format_tree(&engine.tree(), &branches, Some(1));
        assert_eq!(shallow.len(), 2);
    }

    #[test]
    fn test_linear_tree_is_flat() {
        let engine = Engine::in_memory(ErdConfig::default()).unwrap();
        let ctl = engine.controller();
        let (_, main) = ctl.create_root(Role::System, "sys").unwrap();
        for i in 0..20 {
            ctl.append_message(main.id, Role::User, format!("m{i}")).unwrap();
        }

        let lines = format_tree(&engine.tree(), &engine.branches().list(), None);
        assert_eq!(lines.len(), 21);
        assert!(lines.iter().all(|l| !l.starts_with(' ') && !l.contains('─')));
        assert!(lines[20].ends_with("<- main"));
    }

    #[test]
    fn test_branch_lines_show_origin() {
        let engine = Engine::in_memory(ErdConfig::default()).unwrap();
        let ctl = engine.controller();
        let (root, main) = ctl.create_root(Role::System, "").unwrap();
        ctl.fork_branch(main.id, root.id, None).unwrap();

        let lines = format_branches(&engine.branches().list());
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("(from main @"));
    }
}
