//! Wire encoding of committed trees and patches, plus the text fallback for
//! consumers that cannot render blocks.

use serde::{Deserialize, Serialize};

use crate::error::EncodeError;
use crate::node::Node;
use crate::reconcile::Patch;

pub fn encode(tree: &Node) -> Result<Vec<u8>, EncodeError> {
    serde_json::to_vec(tree).map_err(EncodeError::Encode)
}

pub fn decode(bytes: &[u8]) -> Result<Node, EncodeError> {
    serde_json::from_slice(bytes).map_err(EncodeError::Decode)
}

pub fn encode_patch(patch: &Patch) -> Result<Vec<u8>, EncodeError> {
    serde_json::to_vec(patch).map_err(EncodeError::Encode)
}

pub fn decode_patch(bytes: &[u8]) -> Result<Patch, EncodeError> {
    serde_json::from_slice(bytes).map_err(EncodeError::Decode)
}

/// Plain text and markdown renditions of a tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fallback {
    pub plain: String,
    pub rich: String,
}

pub fn encode_fallback(tree: &Node) -> Fallback {
    Fallback {
        plain: lines(tree, Flavor::Plain).join("\n"),
        rich: lines(tree, Flavor::Markdown).join("\n\n"),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Plain,
    Markdown,
}

fn lines(node: &Node, flavor: Flavor) -> Vec<String> {
    match node.tag.as_str() {
        "text" => node
            .str_prop("text")
            .filter(|t| !t.is_empty())
            .map(|t| vec![styled_text(node, t, flavor)])
            .unwrap_or_default(),
        "button" => node
            .str_prop("text")
            .map(|label| match flavor {
                Flavor::Plain => vec![format!("[{label}]")],
                Flavor::Markdown => vec![format!("**\\[{}\\]**", escape_markdown(label))],
            })
            .unwrap_or_default(),
        "image" => {
            let description = node.str_prop("description");
            match flavor {
                Flavor::Plain => description.map(|d| vec![d.to_string()]).unwrap_or_default(),
                Flavor::Markdown => node
                    .str_prop("url")
                    .map(|url| {
                        vec![format!(
                            "![{}]({url})",
                            escape_markdown(description.unwrap_or_default())
                        )]
                    })
                    .unwrap_or_default(),
            }
        }
        "hstack" => {
            let row: Vec<String> = node
                .children
                .iter()
                .flat_map(|c| lines(c, flavor))
                .collect();
            if row.is_empty() {
                vec![]
            } else {
                vec![row.join(" ")]
            }
        }
        _ => node.children.iter().flat_map(|c| lines(c, flavor)).collect(),
    }
}

fn styled_text(node: &Node, text: &str, flavor: Flavor) -> String {
    if flavor == Flavor::Plain {
        return text.to_string();
    }
    let text = escape_markdown(text);
    let heading = matches!(node.str_prop("size"), Some("xlarge" | "xxlarge"));
    let bold = node.str_prop("weight") == Some("bold");
    match (heading, bold) {
        (true, _) => format!("## {text}"),
        (false, true) => format!("**{text}**"),
        (false, false) => text,
    }
}

fn escape_markdown(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '*' | '_' | '[' | ']' | '#' | '`') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::HandlerRef;
    use crate::reconcile::diff;
    use serde_json::{Value, json};

    fn sample() -> Node {
        Node::root(vec![
            Node::new("vstack").with_children(vec![
                Node::new("text")
                    .with_prop("text", "Scores")
                    .with_prop("size", "xlarge"),
                Node::new("hstack").with_children(vec![
                    Node::new("text").with_prop("text", "a_b").with_prop("weight", "bold"),
                    Node::new("button")
                        .with_prop("text", "Go")
                        .with_handler("onPress", HandlerRef::from("App/0/1#onPress")),
                ]),
                Node::new("image")
                    .with_prop("url", "https://i.example/x.png")
                    .with_prop("description", "logo")
                    .with_prop("imageWidth", 64.5),
            ]),
        ])
    }

    #[test]
    fn decode_inverts_encode() {
        let tree = sample();
        let bytes = encode(&tree).unwrap();
        assert_eq!(decode(&bytes).unwrap(), tree);
        assert_eq!(encode(&decode(&bytes).unwrap()).unwrap(), bytes);
    }

    #[test]
    fn float_props_survive_exactly() {
        let children = (1..2000)
            .map(|i| Node::new("text").with_prop("ratio", i as f64 / 7.0 * 1.1))
            .collect();
        let tree = Node::root(vec![
            Node::new("vstack")
                .with_prop("ratio", 3.9285714285714293)
                .with_children(children),
        ]);
        let back = decode(&encode(&tree).unwrap()).unwrap();
        assert_eq!(
            back.children[0].value("ratio").and_then(Value::as_f64),
            Some(3.9285714285714293)
        );
        assert_eq!(back, tree);
    }

    #[test]
    fn value_props_that_look_like_handlers_survive() {
        let tree = Node::root(vec![
            Node::new("text").with_prop("data", json!({"handler": "nope"})),
        ]);
        assert_eq!(decode(&encode(&tree).unwrap()).unwrap(), tree);
    }

    #[test]
    fn patches_round_trip_and_apply_to_decoded_trees() {
        let old = sample();
        let mut new = sample();
        new.children[0].children.swap(0, 2);
        let patch = diff(&old, &new);

        let wire = decode_patch(&encode_patch(&patch).unwrap()).unwrap();
        assert_eq!(wire, patch);

        let applied = wire.apply(Some(decode(&encode(&old).unwrap()).unwrap())).unwrap();
        assert_eq!(encode(&applied).unwrap(), encode(&new).unwrap());
    }

    #[test]
    fn fallback_flattens_layout() {
        let fb = encode_fallback(&sample());
        assert_eq!(fb.plain, "Scores\na_b [Go]\nlogo");
        assert_eq!(
            fb.rich,
            "## Scores\n\n**a\\_b** **\\[Go\\]**\n\n![logo](https://i.example/x.png)"
        );
    }
}
