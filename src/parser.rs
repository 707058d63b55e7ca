//! Parse markup source into a document tree using PEST.

use crate::document::Element;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct MarkupParser;

/// Parse markup source into its root element.
pub fn parse_document(source: &str) -> Result<Element, String> {
    let pairs = MarkupParser::parse(Rule::document, source)
        .map_err(|e| format!("Parse error: {}", e))?;
    let document = pairs.into_iter().next().ok_or("Empty parse")?;
    let root = document
        .into_inner()
        .find(|p| p.as_rule() == Rule::element)
        .ok_or("Document has no root element")?;
    build_element(root)
}

fn build_element(pair: pest::iterators::Pair<Rule>) -> Result<Element, String> {
    let line = pair.as_span().start_pos().line_col().0;
    let mut element = Element {
        line,
        ..Default::default()
    };
    let mut text_parts: Vec<String> = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::tag_name => element.tag = inner.as_str().to_string(),
            Rule::attribute => element.attrs.push(build_attribute(inner)?),
            Rule::element => element.children.push(build_element(inner)?),
            Rule::text => {
                let t = decode_entities(inner.as_str().trim())?;
                if !t.is_empty() {
                    text_parts.push(t);
                }
            }
            Rule::cdata => {
                let raw = inner.into_inner().next().map(|p| p.as_str()).unwrap_or("");
                if !raw.trim().is_empty() {
                    text_parts.push(raw.trim().to_string());
                }
            }
            Rule::close_name => {
                if inner.as_str() != element.tag {
                    return Err(format!(
                        "Line {}: closing tag </{}> does not match <{}>",
                        inner.as_span().start_pos().line_col().0,
                        inner.as_str(),
                        element.tag
                    ));
                }
            }
            _ => {}
        }
    }

    element.text = text_parts.join(" ");
    Ok(element)
}

fn build_attribute(pair: pest::iterators::Pair<Rule>) -> Result<(String, String), String> {
    let mut it = pair.into_inner();
    let name = it.next().ok_or("attribute: name")?.as_str().to_string();
    let value_pair = it.next().ok_or("attribute: value")?;
    let raw = value_pair
        .into_inner()
        .next()
        .map(|p| p.as_str())
        .unwrap_or("");
    Ok((name, decode_entities(raw)?))
}

/// Replace predefined and numeric character references.
fn decode_entities(s: &str) -> Result<String, String> {
    if !s.contains('&') {
        return Ok(s.to_string());
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| format!("Unterminated entity reference in \"{}\"", s))?;
        let entity = &after[..semi];
        let ch = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| format!("Unknown entity reference &{};", entity))?
            }
        };
        out.push(ch);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
