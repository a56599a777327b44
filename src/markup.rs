use crate::editor::{Document, NodeData, NodeId, Result, TextFormat};

/// Deterministic HTML-like projection of the document tree.
///
/// Blocks without content render as `<br>`, so an empty paragraph reads
/// `<p><br></p>`. Directions appear as `dir` attributes once known.
pub fn to_markup(document: &Document) -> Result<String> {
    let mut out = String::new();
    for &top in document.children(document.root())? {
        write_node(document, top, &mut out)?;
    }
    Ok(out)
}

fn write_node(document: &Document, id: NodeId, out: &mut String) -> Result<()> {
    match document.data(id)? {
        NodeData::Root => {
            for &child in document.children(id)? {
                write_node(document, child, out)?;
            }
        }
        NodeData::Paragraph { direction } => {
            open_block(out, "p", direction.map(|d| d.as_str()));
            write_inline(document, id, out)?;
            out.push_str("</p>");
        }
        NodeData::ListItem { direction } => {
            open_block(out, "li", direction.map(|d| d.as_str()));
            write_inline(document, id, out)?;
            out.push_str("</li>");
        }
        NodeData::List { ordered } => {
            let tag = if *ordered { "ol" } else { "ul" };
            out.push('<');
            out.push_str(tag);
            out.push('>');
            for &item in document.children(id)? {
                write_node(document, item, out)?;
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        NodeData::Text { text, format } => {
            match format {
                TextFormat::Plain => out.push_str("<span>"),
                TextFormat::Hashtag => out.push_str("<span class=\"hashtag\">"),
            }
            push_escaped(out, text);
            out.push_str("</span>");
        }
        NodeData::Decorator { text, .. } => {
            out.push_str("<span class=\"decorator\">");
            push_escaped(out, text);
            out.push_str("</span>");
        }
    }
    Ok(())
}

fn open_block(out: &mut String, tag: &str, direction: Option<&str>) {
    out.push('<');
    out.push_str(tag);
    if let Some(direction) = direction {
        out.push_str(" dir=\"");
        out.push_str(direction);
        out.push('"');
    }
    out.push('>');
}

fn write_inline(document: &Document, block: NodeId, out: &mut String) -> Result<()> {
    let children = document.children(block)?;
    if children.is_empty() {
        out.push_str("<br>");
        return Ok(());
    }
    for &child in children {
        write_node(document, child, out)?;
    }
    Ok(())
}

fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
