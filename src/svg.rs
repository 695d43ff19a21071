//! Minimal SVG document tree.
//!
//! Nodes are built programmatically and serialized once. Serialization is
//! byte-deterministic: attribute order is fixed and numbers go through
//! [`fmt_num`].

use std::fmt::Write;

/// Format a coordinate with at most two decimals and no trailing zeros
pub fn fmt_num(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        let s = format!("{:.2}", rounded);
        s.trim_end_matches('0').to_string()
    }
}

/// Escape text for element content and attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct RectNode {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill: String,
    pub rx: Option<f64>,
    pub opacity: Option<f64>,
}

impl RectNode {
    pub fn new(x: f64, y: f64, width: f64, height: f64, fill: impl Into<String>) -> Self {
        Self {
            x,
            y,
            width,
            height,
            fill: fill.into(),
            rx: None,
            opacity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageNode {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Full `data:` URI
    pub href: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub x: f64,
    pub y: f64,
    pub content: String,
    pub font_family: String,
    pub font_size: f64,
    pub fill: String,
    pub opacity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Rect(RectNode),
    Image(ImageNode),
    Text(TextNode),
    Group {
        translate: (f64, f64),
        scale: Option<f64>,
        children: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub width: f64,
    pub height: f64,
    pub children: Vec<Node>,
}

impl Document {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            children: Vec::new(),
        }
    }

    pub fn push(&mut self, node: Node) {
        self.children.push(node);
    }

    pub fn uses_xlink(&self) -> bool {
        fn walk(nodes: &[Node]) -> bool {
            nodes.iter().any(|n| match n {
                Node::Image(_) => true,
                Node::Group { children, .. } => walk(children),
                _ => false,
            })
        }
        walk(&self.children)
    }

    pub fn to_svg_string(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let xlink = if self.uses_xlink() {
            " xmlns:xlink=\"http://www.w3.org/1999/xlink\""
        } else {
            ""
        };
        let (w, h) = (fmt_num(self.width), fmt_num(self.height));
        let _ = writeln!(
            out,
            "<svg xmlns=\"http://www.w3.org/2000/svg\"{} version=\"1.1\" width=\"{}\" height=\"{}\" viewBox=\"0 0 {} {}\">",
            xlink, w, h, w, h
        );
        for node in &self.children {
            write_node(&mut out, node, 1);
        }
        out.push_str("</svg>\n");
        out
    }
}

fn write_node(out: &mut String, node: &Node, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        Node::Rect(r) => {
            let _ = write!(
                out,
                "{}<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\"",
                indent,
                fmt_num(r.x),
                fmt_num(r.y),
                fmt_num(r.width),
                fmt_num(r.height),
                escape(&r.fill)
            );
            if let Some(rx) = r.rx {
                let _ = write!(out, " rx=\"{0}\" ry=\"{0}\"", fmt_num(rx));
            }
            if let Some(opacity) = r.opacity {
                let _ = write!(out, " opacity=\"{}\"", fmt_num(opacity));
            }
            out.push_str("/>\n");
        }
        Node::Image(i) => {
            let _ = writeln!(
                out,
                "{}<image x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" preserveAspectRatio=\"xMidYMid meet\" xlink:href=\"{}\"/>",
                indent,
                fmt_num(i.x),
                fmt_num(i.y),
                fmt_num(i.width),
                fmt_num(i.height),
                escape(&i.href)
            );
        }
        Node::Text(t) => {
            let _ = write!(
                out,
                "{}<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" dominant-baseline=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\"",
                indent,
                fmt_num(t.x),
                fmt_num(t.y),
                escape(&t.font_family),
                fmt_num(t.font_size),
                escape(&t.fill)
            );
            if let Some(opacity) = t.opacity {
                let _ = write!(out, " opacity=\"{}\"", fmt_num(opacity));
            }
            let _ = writeln!(out, ">{}</text>", escape(&t.content));
        }
        Node::Group {
            translate,
            scale,
            children,
        } => {
            let mut transform = format!("translate({},{})", fmt_num(translate.0), fmt_num(translate.1));
            if let Some(s) = scale {
                let _ = write!(transform, " scale({})", fmt_num_precise(*s));
            }
            let _ = writeln!(out, "{}<g transform=\"{}\">", indent, transform);
            for child in children {
                write_node(out, child, depth + 1);
            }
            let _ = writeln!(out, "{}</g>", indent);
        }
    }
}

/// Scale factors need more precision than pixel coordinates
fn fmt_num_precise(value: f64) -> String {
    let s = format!("{:.6}", value);
    let s = s.trim_end_matches('0');
    s.trim_end_matches('.').to_string()
}
