//! XML prolog matcher.
//!
//! A loose subset of the XML 1.0 prolog grammar:
//!
//! ```text
//! S          ::= [ \t\r\n]+
//! Name       ::= [A-Za-z_:] [A-Za-z0-9_:.-]*
//! Literal    ::= '"' [^"]* '"' | "'" [^']* "'"
//! PERef      ::= '%' Name ';'
//! Comment    ::= '<!--' ('-'? [^-]+)+ '-->'
//! PI         ::= '<?' ('?'? [^>]+)* '?>'
//! XMLDecl    ::= '<?xml' S 'version' S? '=' S? ('"1.' [0-9]+ '"' | "'1." [0-9]+ "'") [^?]* '?>'
//! Misc       ::= S | Comment | PI
//! MarkupDecl ::= '<!' ('ELEMENT' | 'ATTLIST' | 'ENTITY' | 'NOTATION') (Literal | [^>])* '>'
//! IntSubset  ::= (PI | Comment | MarkupDecl | S | PERef)*
//! Doctype    ::= '<!DOCTYPE' S (Literal | [^"'\[>]+)+ ('[' IntSubset ']' S?)? '>'
//! Prolog     ::= XMLDecl Misc* (Doctype Misc*)?
//! ```
//!
//! Differences from XML that callers rely on: the XML declaration is
//! mandatory, a comment body may not contain `--`, and the root element must
//! start right where the prolog ends.
//!
//! Matching follows backtracking-regex semantics. Every sub-pattern yields its
//! candidate end offsets in preference order (greedy first), and the prolog
//! match is the first candidate of the whole pattern. Repetitions are
//! memoized per start offset so pathological input stays polynomial.

use std::collections::{HashMap, HashSet};

/// Candidate end offsets of a sub-pattern, most preferred first.
type Ends = Vec<usize>;

/// Returns the length in bytes of the prolog at the start of `text`.
///
/// `None` when `text` does not open with an XML declaration that the grammar
/// accepts. The returned offset always falls on a character boundary.
pub fn match_prolog(text: &str) -> Option<usize> {
    Matcher::new(text).prolog().first().copied()
}

/// Extracts the name of the root element that follows the prolog.
///
/// The name keeps any namespace prefix (`rdf:RDF`). Nothing is skipped
/// between the end of the prolog and the `<` of the root element.
///
/// # Examples
///
/// ```
/// use feed_sniff::sniff::root_element_name;
///
/// assert_eq!(root_element_name(r#"<?xml version="1.0"?><rss><channel/></rss>"#), Some("rss"));
/// assert_eq!(root_element_name("<html><body>hi</body></html>"), None);
/// ```
pub fn root_element_name(text: &str) -> Option<&str> {
    let matcher = Matcher::new(text);
    let prolog_end = matcher.prolog().first().copied()?;
    let name_start = matcher.literal(prolog_end, b"<")?;
    let name_end = matcher.name_end(name_start)?;
    text.get(name_start..name_end)
}

/// Sequences two sub-patterns: every end of the first feeds the second.
fn then(firsts: Ends, mut next: impl FnMut(usize) -> Ends) -> Ends {
    let mut seen = HashSet::new();
    let mut ends = Ends::new();
    for first in firsts {
        for end in next(first) {
            if seen.insert(end) {
                ends.push(end);
            }
        }
    }
    ends
}

fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_name_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte == b':'
}

fn is_name_char(byte: u8) -> bool {
    is_name_start(byte) || byte.is_ascii_digit() || byte == b'-' || byte == b'.'
}

struct Matcher<'t> {
    text: &'t [u8],
}

impl<'t> Matcher<'t> {
    fn new(text: &'t str) -> Self {
        Self {
            text: text.as_bytes(),
        }
    }

    fn at(&self, pos: usize) -> Option<u8> {
        self.text.get(pos).copied()
    }

    fn rest(&self, pos: usize) -> &'t [u8] {
        self.text.get(pos..).unwrap_or_default()
    }

    fn literal(&self, pos: usize, lit: &[u8]) -> Option<usize> {
        self.rest(pos).starts_with(lit).then_some(pos + lit.len())
    }

    fn space_run(&self, pos: usize) -> usize {
        self.rest(pos).iter().take_while(|&&b| is_space(b)).count()
    }

    fn space_plus(&self, pos: usize) -> Ends {
        let run = self.space_run(pos);
        (1..=run).rev().map(|len| pos + len).collect()
    }

    fn space_star(&self, pos: usize) -> Ends {
        let run = self.space_run(pos);
        (0..=run).rev().map(|len| pos + len).collect()
    }

    /// Greedy `Name`. Nothing that follows a name in this grammar is a name
    /// character, so the longest match is the only useful one.
    fn name_end(&self, pos: usize) -> Option<usize> {
        if !is_name_start(self.at(pos)?) {
            return None;
        }
        let tail = self.rest(pos + 1).iter().take_while(|&&b| is_name_char(b)).count();
        Some(pos + 1 + tail)
    }

    fn quoted_literal(&self, pos: usize) -> Option<usize> {
        let quote = self.at(pos).filter(|&b| b == b'"' || b == b'\'')?;
        let len = self.rest(pos + 1).iter().position(|&b| b == quote)?;
        Some(pos + 1 + len + 1)
    }

    fn pe_reference(&self, pos: usize) -> Option<usize> {
        let name_start = self.literal(pos, b"%")?;
        let name_end = self.name_end(name_start)?;
        self.literal(name_end, b";")
    }

    /// The body cannot contain `--`, so the comment ends at the first `--`,
    /// which must be followed by `>` and preceded by a non-empty body.
    fn comment(&self, pos: usize) -> Option<usize> {
        let body_start = self.literal(pos, b"<!--")?;
        let body_len = self.rest(body_start).windows(2).position(|w| w == b"--")?;
        if body_len == 0 {
            return None;
        }
        self.literal(body_start + body_len, b"-->")
    }

    /// The body cannot contain `>`, so the instruction ends at the first `>`,
    /// which must close a `?>` that does not overlap the opening `<?`.
    fn processing_instruction(&self, pos: usize) -> Option<usize> {
        let body_start = self.literal(pos, b"<?")?;
        let close = body_start + self.rest(body_start).iter().position(|&b| b == b'>')?;
        if close == body_start || self.at(close - 1) != Some(b'?') {
            return None;
        }
        Some(close + 1)
    }

    fn version_number(&self, pos: usize) -> Option<usize> {
        let quote = self.at(pos).filter(|&b| b == b'"' || b == b'\'')?;
        let digits_start = self.literal(pos + 1, b"1.")?;
        let digits = self.rest(digits_start).iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 || self.at(digits_start + digits) != Some(quote) {
            return None;
        }
        Some(digits_start + digits + 1)
    }

    fn xml_decl(&self) -> Option<usize> {
        let mut pos = self.literal(0, b"<?xml")?;
        let spaces = self.space_run(pos);
        if spaces == 0 {
            return None;
        }
        pos = self.literal(pos + spaces, b"version")?;
        pos += self.space_run(pos);
        pos = self.literal(pos, b"=")?;
        pos += self.space_run(pos);
        pos = self.version_number(pos)?;
        let question = pos + self.rest(pos).iter().position(|&b| b == b'?')?;
        self.literal(question, b"?>")
    }

    /// Greedy `item*` starting at `pos`.
    fn star(&self, pos: usize, item: &dyn Fn(usize) -> Ends) -> Ends {
        self.repeat(pos, item, &mut HashMap::new())
    }

    /// Greedy `item+` starting at `pos`.
    fn plus(&self, pos: usize, item: &dyn Fn(usize) -> Ends) -> Ends {
        let mut memo = HashMap::new();
        let firsts = item(pos).into_iter().filter(|&end| end > pos).collect();
        then(firsts, |next| self.repeat(next, item, &mut memo))
    }

    fn repeat(
        &self,
        pos: usize,
        item: &dyn Fn(usize) -> Ends,
        memo: &mut HashMap<usize, Ends>,
    ) -> Ends {
        if let Some(ends) = memo.get(&pos) {
            return ends.clone();
        }
        let advancing = item(pos).into_iter().filter(|&end| end > pos).collect();
        let mut ends = then(advancing, |next| self.repeat(next, item, memo));
        if !ends.contains(&pos) {
            ends.push(pos);
        }
        memo.insert(pos, ends.clone());
        ends
    }

    fn misc_item(&self, pos: usize) -> Ends {
        let mut ends = self.space_plus(pos);
        ends.extend(self.comment(pos));
        ends.extend(self.processing_instruction(pos));
        ends
    }

    fn misc(&self, pos: usize) -> Ends {
        self.star(pos, &|p| self.misc_item(p))
    }

    fn markup_decl_item(&self, pos: usize) -> Ends {
        let mut ends: Ends = self.quoted_literal(pos).into_iter().collect();
        if self.at(pos).is_some_and(|b| b != b'>') {
            ends.push(pos + 1);
        }
        ends
    }

    fn markup_decl(&self, pos: usize) -> Ends {
        let Some(keyword_start) = self.literal(pos, b"<!") else {
            return Ends::new();
        };
        let keywords: [&[u8]; 4] = [b"ELEMENT", b"ATTLIST", b"ENTITY", b"NOTATION"];
        let Some(body_start) = keywords
            .iter()
            .find_map(|keyword| self.literal(keyword_start, keyword))
        else {
            return Ends::new();
        };
        self.star(body_start, &|p| self.markup_decl_item(p))
            .into_iter()
            .filter(|&end| self.at(end) == Some(b'>'))
            .map(|end| end + 1)
            .collect()
    }

    fn subset_item(&self, pos: usize) -> Ends {
        let mut ends: Ends = self.processing_instruction(pos).into_iter().collect();
        ends.extend(self.comment(pos));
        ends.extend(self.markup_decl(pos));
        ends.extend(self.space_plus(pos));
        ends.extend(self.pe_reference(pos));
        ends
    }

    /// `'[' IntSubset ']' S?` starting at `pos`.
    fn internal_subset(&self, pos: usize) -> Ends {
        let Some(subset_start) = self.literal(pos, b"[") else {
            return Ends::new();
        };
        let closed = self
            .star(subset_start, &|p| self.subset_item(p))
            .into_iter()
            .filter_map(|end| self.literal(end, b"]"))
            .collect();
        then(closed, |end| self.space_star(end))
    }

    fn doctype_token(&self, pos: usize) -> Ends {
        let mut ends: Ends = self.quoted_literal(pos).into_iter().collect();
        let run = self
            .rest(pos)
            .iter()
            .take_while(|&&b| !matches!(b, b'"' | b'\'' | b'[' | b'>'))
            .count();
        ends.extend((1..=run).rev().map(|len| pos + len));
        ends
    }

    fn doctype(&self, pos: usize) -> Ends {
        let Some(keyword_end) = self.literal(pos, b"<!DOCTYPE") else {
            return Ends::new();
        };
        let tokens = then(self.space_plus(keyword_end), |p| {
            self.plus(p, &|q| self.doctype_token(q))
        });
        then(tokens, |p| {
            let mut before_close = self.internal_subset(p);
            before_close.push(p);
            before_close
                .into_iter()
                .filter_map(|end| self.literal(end, b">"))
                .collect()
        })
    }

    fn prolog(&self) -> Ends {
        let Some(decl_end) = self.xml_decl() else {
            return Ends::new();
        };
        then(self.misc(decl_end), |p| {
            let mut ends = then(self.doctype(p), |q| self.misc(q));
            ends.push(p);
            ends
        })
    }
}
