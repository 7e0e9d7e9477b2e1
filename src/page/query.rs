//! Locator evaluation against a [`Page`].
//!
//! Each locator kind has a deliberately small grammar: exactly the shapes the
//! extraction strategies emit, plus enough of CSS and XPath to accept
//! hand-written selectors in traces.
//!
//! - css: `tag`, `*`, `#id`, `.class`, `[attr]`, `[attr="v"]`,
//!   `:nth-child(n)`, `:nth-of-type(n)`, joined by ` > ` or whitespace
//! - xpath: `/step` and `//step`, name tests (`tag` or `*`), `[n]` and
//!   `[@attr="v"]` predicates
//! - text: `text="exact"` or `text*="substring"`, optionally scoped with
//!   `tag >> `; only the deepest matching elements are returned
//! - role: `role=name` or `role=name[name="accessible label"]`

use std::collections::BTreeSet;
use std::fmt::Display;

use crate::locator::{Locator, LocatorKind};
use crate::page::{NodeId, Page, roles};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryError {
    Syntax {
        kind: LocatorKind,
        position: usize,
        message: String,
    },
    Unsupported {
        kind: LocatorKind,
        feature: String,
    },
}

impl Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Syntax {
                kind,
                position,
                message,
            } => write!(
                f,
                "invalid {} locator at offset {}: {}",
                kind, position, message
            ),
            QueryError::Unsupported { kind, feature } => {
                write!(f, "unsupported {} locator feature: {}", kind, feature)
            }
        }
    }
}

impl std::error::Error for QueryError {}

pub type QueryResult<T> = std::result::Result<T, QueryError>;

#[derive(Clone, Debug, PartialEq)]
pub enum ParsedLocator {
    Css(CssSelector),
    Xpath(XPath),
    Text(TextQuery),
    Role(RoleQuery),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CssSelector {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Combinator {
    Child,
    Descendant,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    filters: Vec<CssFilter>,
}

#[derive(Clone, Debug, PartialEq)]
enum CssFilter {
    Id(String),
    Class(String),
    Attribute { name: String, value: Option<String> },
    NthChild(usize),
    NthOfType(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct XPath {
    steps: Vec<XPathStep>,
}

#[derive(Clone, Debug, PartialEq)]
struct XPathStep {
    descendant: bool,
    name: Option<String>,
    predicates: Vec<Predicate>,
}

#[derive(Clone, Debug, PartialEq)]
enum Predicate {
    Position(usize),
    Attribute { name: String, value: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextQuery {
    scope: Option<String>,
    needle: String,
    exact: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoleQuery {
    role: String,
    name: Option<String>,
}

impl ParsedLocator {
    pub fn is_id_anchored(&self) -> bool {
        match self {
            ParsedLocator::Css(selector) => selector
                .compounds
                .iter()
                .flat_map(|c| &c.filters)
                .any(|filter| matches!(filter, CssFilter::Id(_))),
            ParsedLocator::Xpath(_) => self.references_attribute("id"),
            _ => false,
        }
    }

    pub fn references_attribute(&self, attribute: &str) -> bool {
        match self {
            ParsedLocator::Css(selector) => selector
                .compounds
                .iter()
                .flat_map(|c| &c.filters)
                .any(|filter| {
                    matches!(filter, CssFilter::Attribute { name, .. } if name == attribute)
                }),
            ParsedLocator::Xpath(path) => path
                .steps
                .iter()
                .flat_map(|s| &s.predicates)
                .any(|predicate| {
                    matches!(predicate, Predicate::Attribute { name, .. } if name == attribute)
                }),
            _ => false,
        }
    }
}

pub fn parse(locator: &Locator) -> QueryResult<ParsedLocator> {
    let value = locator.value.as_str();
    match locator.kind {
        LocatorKind::Css => parse_css(value).map(ParsedLocator::Css),
        LocatorKind::Xpath => parse_xpath(value).map(ParsedLocator::Xpath),
        LocatorKind::Text => parse_text(value).map(ParsedLocator::Text),
        LocatorKind::Role => parse_role(value).map(ParsedLocator::Role),
    }
}

struct Cursor<'a> {
    source: &'a str,
    position: usize,
    kind: LocatorKind,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str, kind: LocatorKind) -> Self {
        Cursor {
            source,
            position: 0,
            kind,
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.position..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let char = self.peek()?;
        self.position += char.len_utf8();
        Some(char)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.position += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, expected: &str) -> bool {
        if self.rest().starts_with(expected) {
            self.position += expected.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> QueryResult<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", expected)))
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.position;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.position > start
    }

    fn is_done(&self) -> bool {
        self.position >= self.source.len()
    }

    fn at_ident(&self) -> bool {
        self.peek().is_some_and(is_ident_char)
    }

    fn ident(&mut self) -> QueryResult<String> {
        let start = self.position;
        while self.at_ident() {
            self.bump();
        }
        if self.position == start {
            return Err(self.error("expected a name".to_string()));
        }
        Ok(self.source[start..self.position].to_string())
    }

    fn string(&mut self) -> QueryResult<String> {
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(escaped) => value.push(escaped),
                    None => break,
                },
                Some('"') => return Ok(value),
                Some(char) => value.push(char),
                None => break,
            }
        }
        Err(self.error("unterminated string".to_string()))
    }

    fn number(&mut self) -> QueryResult<usize> {
        let start = self.position;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        match self.source[start..self.position].parse::<usize>() {
            Ok(number) if number >= 1 => Ok(number),
            _ => Err(self.error("expected a positive index".to_string())),
        }
    }

    fn finish(&self) -> QueryResult<()> {
        if self.is_done() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing input".to_string()))
        }
    }

    fn error(&self, message: String) -> QueryError {
        QueryError::Syntax {
            kind: self.kind,
            position: self.position,
            message,
        }
    }
}

fn is_ident_char(char: char) -> bool {
    char.is_alphanumeric() || char == '-' || char == '_'
}

fn parse_css(source: &str) -> QueryResult<CssSelector> {
    let mut cursor = Cursor::new(source, LocatorKind::Css);
    let mut selector = CssSelector::default();
    cursor.skip_whitespace();
    loop {
        selector.compounds.push(parse_compound(&mut cursor)?);
        let had_space = cursor.skip_whitespace();
        if cursor.is_done() {
            break;
        }
        if cursor.eat('>') {
            cursor.skip_whitespace();
            selector.combinators.push(Combinator::Child);
        } else if had_space {
            selector.combinators.push(Combinator::Descendant);
        } else {
            return Err(cursor.error("unexpected character".to_string()));
        }
    }
    Ok(selector)
}

fn parse_compound(cursor: &mut Cursor) -> QueryResult<Compound> {
    let mut compound = Compound::default();
    let universal = cursor.eat('*');
    if !universal && cursor.at_ident() {
        compound.tag = Some(cursor.ident()?.to_ascii_lowercase());
    }
    loop {
        match cursor.peek() {
            Some('#') => {
                cursor.bump();
                compound.filters.push(CssFilter::Id(cursor.ident()?));
            }
            Some('.') => {
                cursor.bump();
                compound.filters.push(CssFilter::Class(cursor.ident()?));
            }
            Some('[') => {
                cursor.bump();
                cursor.skip_whitespace();
                let name = cursor.ident()?;
                cursor.skip_whitespace();
                let value = if cursor.eat('=') {
                    cursor.skip_whitespace();
                    Some(cursor.string()?)
                } else {
                    None
                };
                cursor.skip_whitespace();
                cursor.expect(']')?;
                compound.filters.push(CssFilter::Attribute { name, value });
            }
            Some(':') => {
                cursor.bump();
                let name = cursor.ident()?;
                cursor.expect('(')?;
                let index = cursor.number()?;
                cursor.expect(')')?;
                let filter = match name.as_str() {
                    "nth-child" => CssFilter::NthChild(index),
                    "nth-of-type" => CssFilter::NthOfType(index),
                    _ => {
                        return Err(QueryError::Unsupported {
                            kind: LocatorKind::Css,
                            feature: format!(":{}", name),
                        });
                    }
                };
                compound.filters.push(filter);
            }
            _ => break,
        }
    }
    if !universal && compound.tag.is_none() && compound.filters.is_empty() {
        return Err(cursor.error("expected a selector".to_string()));
    }
    Ok(compound)
}

fn parse_xpath(source: &str) -> QueryResult<XPath> {
    let mut cursor = Cursor::new(source.trim(), LocatorKind::Xpath);
    let mut steps = Vec::new();
    while !cursor.is_done() {
        let descendant = if cursor.eat_str("//") {
            true
        } else if cursor.eat('/') {
            false
        } else {
            return Err(cursor.error("expected '/' or '//'".to_string()));
        };
        let name = if cursor.eat('*') {
            None
        } else {
            Some(cursor.ident()?.to_ascii_lowercase())
        };
        if cursor.peek() == Some('(') {
            return Err(QueryError::Unsupported {
                kind: LocatorKind::Xpath,
                feature: format!("{}()", name.unwrap_or_default()),
            });
        }
        let mut predicates = Vec::new();
        while cursor.eat('[') {
            cursor.skip_whitespace();
            let predicate = if cursor.eat('@') {
                let name = cursor.ident()?;
                cursor.skip_whitespace();
                cursor.expect('=')?;
                cursor.skip_whitespace();
                let value = cursor.string()?;
                Predicate::Attribute { name, value }
            } else {
                Predicate::Position(cursor.number()?)
            };
            cursor.skip_whitespace();
            cursor.expect(']')?;
            predicates.push(predicate);
        }
        steps.push(XPathStep {
            descendant,
            name,
            predicates,
        });
    }
    if steps.is_empty() {
        return Err(cursor.error("empty path".to_string()));
    }
    Ok(XPath { steps })
}

fn parse_text(source: &str) -> QueryResult<TextQuery> {
    let mut cursor = Cursor::new(source, LocatorKind::Text);
    cursor.skip_whitespace();
    let scope = parse_scope(&mut cursor)?;
    let exact = if cursor.eat_str("text*=") {
        false
    } else if cursor.eat_str("text=") {
        true
    } else {
        return Err(cursor.error("expected 'text=' or 'text*='".to_string()));
    };
    let needle = cursor.string()?;
    cursor.finish()?;
    Ok(TextQuery {
        scope,
        needle,
        exact,
    })
}

/// An optional `tag >> ` prefix. Leaves the cursor untouched when the input
/// starts with the text clause itself.
fn parse_scope(cursor: &mut Cursor) -> QueryResult<Option<String>> {
    let start = cursor.position;
    if !cursor.at_ident() {
        return Ok(None);
    }
    let tag = cursor.ident()?;
    cursor.skip_whitespace();
    if !cursor.eat_str(">>") {
        cursor.position = start;
        return Ok(None);
    }
    cursor.skip_whitespace();
    Ok(Some(tag.to_ascii_lowercase()))
}

fn parse_role(source: &str) -> QueryResult<RoleQuery> {
    let mut cursor = Cursor::new(source, LocatorKind::Role);
    if !cursor.eat_str("role=") {
        return Err(cursor.error("expected 'role='".to_string()));
    }
    let role = cursor.ident()?;
    let name = if cursor.eat('[') {
        if !cursor.eat_str("name") {
            return Err(cursor.error("expected 'name'".to_string()));
        }
        cursor.expect('=')?;
        let name = cursor.string()?;
        cursor.expect(']')?;
        Some(name)
    } else {
        None
    };
    cursor.finish()?;
    Ok(RoleQuery { role, name })
}

impl Page {
    /// All elements the locator resolves to, in document order.
    pub fn query(&self, locator: &Locator) -> QueryResult<Vec<NodeId>> {
        let parsed = parse(locator)?;
        Ok(self.evaluate(&parsed))
    }

    pub fn count(&self, locator: &Locator) -> QueryResult<usize> {
        self.query(locator).map(|matches| matches.len())
    }

    /// Whether the locator resolves to exactly `id` and nothing else.
    pub fn resolves_to(
        &self,
        locator: &Locator,
        id: NodeId,
    ) -> QueryResult<bool> {
        self.query(locator).map(|matches| matches == [id])
    }

    pub fn evaluate(&self, parsed: &ParsedLocator) -> Vec<NodeId> {
        match parsed {
            ParsedLocator::Css(selector) => self.evaluate_css(selector),
            ParsedLocator::Xpath(path) => self.evaluate_xpath(path),
            ParsedLocator::Text(query) => self.evaluate_text(query),
            ParsedLocator::Role(query) => self.evaluate_role(query),
        }
    }

    fn evaluate_css(&self, selector: &CssSelector) -> Vec<NodeId> {
        let last = selector.compounds.len() - 1;
        self.elements()
            .map(|(id, _)| id)
            .filter(|id| self.matches_chain(*id, selector, last))
            .collect()
    }

    fn matches_chain(
        &self,
        id: NodeId,
        selector: &CssSelector,
        index: usize,
    ) -> bool {
        if !self.matches_compound(id, &selector.compounds[index]) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match selector.combinators[index - 1] {
            Combinator::Child => self
                .get(id)
                .and_then(|e| e.parent)
                .is_some_and(|parent| {
                    self.matches_chain(parent, selector, index - 1)
                }),
            Combinator::Descendant => self
                .ancestors(id)
                .any(|ancestor| self.matches_chain(ancestor, selector, index - 1)),
        }
    }

    fn matches_compound(&self, id: NodeId, compound: &Compound) -> bool {
        let Some(element) = self.get(id) else {
            return false;
        };
        if let Some(tag) = &compound.tag
            && *tag != element.tag
        {
            return false;
        }
        compound.filters.iter().all(|filter| match filter {
            CssFilter::Id(value) => element.id() == Some(value.as_str()),
            CssFilter::Class(class) => element.classes().any(|c| c == class),
            CssFilter::Attribute { name, value } => {
                match (element.attribute(name), value) {
                    (Some(actual), Some(expected)) => actual == expected,
                    (Some(_), None) => true,
                    (None, _) => false,
                }
            }
            CssFilter::NthChild(index) => self.child_index(id) == *index,
            CssFilter::NthOfType(index) => self.same_tag_index(id) == *index,
        })
    }

    fn evaluate_xpath(&self, path: &XPath) -> Vec<NodeId> {
        // `None` stands for the document node above the root element.
        let mut context: Vec<Option<NodeId>> = vec![None];
        for step in &path.steps {
            let mut parents: BTreeSet<Option<NodeId>> = BTreeSet::new();
            for node in &context {
                parents.insert(*node);
                if step.descendant {
                    let below: Vec<NodeId> = match node {
                        None => self.elements().map(|(id, _)| id).collect(),
                        Some(id) => self.descendants(*id),
                    };
                    parents.extend(below.into_iter().map(Some));
                }
            }

            let mut next: BTreeSet<NodeId> = BTreeSet::new();
            for parent in parents {
                let children: Vec<NodeId> = match parent {
                    None if self.is_empty() => Vec::new(),
                    None => vec![self.root()],
                    Some(id) => self
                        .get(id)
                        .map(|e| e.children.clone())
                        .unwrap_or_default(),
                };
                let mut selected: Vec<NodeId> = children
                    .into_iter()
                    .filter(|child| match &step.name {
                        Some(name) => {
                            self.get(*child).is_some_and(|e| e.tag == *name)
                        }
                        None => true,
                    })
                    .collect();
                for predicate in &step.predicates {
                    selected = match predicate {
                        Predicate::Position(index) => {
                            selected.get(index - 1).copied().into_iter().collect()
                        }
                        Predicate::Attribute { name, value } => selected
                            .into_iter()
                            .filter(|child| {
                                self.get(*child).and_then(|e| e.attribute(name))
                                    == Some(value.as_str())
                            })
                            .collect(),
                    };
                }
                next.extend(selected);
            }
            context = next.into_iter().map(Some).collect();
        }
        context.into_iter().flatten().collect()
    }

    fn evaluate_text(&self, query: &TextQuery) -> Vec<NodeId> {
        let matches = |id: NodeId| {
            self.get(id).is_some_and(|element| {
                let in_scope = match &query.scope {
                    Some(scope) => element.tag == *scope,
                    None => true,
                };
                in_scope
                    && !element.text.is_empty()
                    && if query.exact {
                        element.text == query.needle
                    } else {
                        element.text.contains(&query.needle)
                    }
            })
        };
        self.elements()
            .map(|(id, _)| id)
            .filter(|id| matches(*id))
            .filter(|id| !self.descendants(*id).into_iter().any(matches))
            .collect()
    }

    fn evaluate_role(&self, query: &RoleQuery) -> Vec<NodeId> {
        self.elements()
            .filter(|(_, element)| {
                roles::role_of(element) == Some(query.role.as_str())
                    && match &query.name {
                        Some(name) => {
                            roles::accessible_label(element)
                                == Some(name.as_str())
                        }
                        None => true,
                    }
            })
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn page() -> Page {
        Page::parse(indoc! { r#"
        <html>
        <body>
          <div id="app">
            <form class="login wide">
              <input name="user" type="text" placeholder="Username">
              <input name="pass" type="password">
              <button type="submit" data-testid="login-submit">Sign <span>in</span></button>
            </form>
            <ul>
              <li>Apples</li>
              <li>Pears</li>
              <li><a href="/more">See more fruit</a></li>
            </ul>
            <div role="button" aria-label="Close dialog">x</div>
          </div>
        </body>
        </html>
        "# })
        .unwrap()
    }

    fn tags(page: &Page, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|id| page.get(*id).unwrap().tag.clone()).collect()
    }

    #[test]
    fn test_css_id_and_attributes() {
        let page = page();
        assert_eq!(tags(&page, &page.query(&Locator::css("#app")).unwrap()), vec!["div"]);
        let inputs = page
            .query(&Locator::css(r#"input[name="user"][type="text"]"#))
            .unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(page.count(&Locator::css("input[name]")).unwrap(), 2);
        assert_eq!(
            page.count(&Locator::css(r#"[data-testid="login-submit"]"#))
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_css_combinators_and_positions() {
        let page = page();
        assert_eq!(page.count(&Locator::css("form.login.wide > input")).unwrap(), 2);
        assert_eq!(page.count(&Locator::css("#app li")).unwrap(), 3);
        assert_eq!(page.count(&Locator::css("#app > li")).unwrap(), 0);
        let second = page.query(&Locator::css("ul > li:nth-child(2)")).unwrap();
        assert_eq!(page.get(second[0]).unwrap().text, "Pears");
        assert_eq!(page.count(&Locator::css("input:nth-of-type(2)")).unwrap(), 1);
    }

    #[test]
    fn test_xpath_paths() {
        let page = page();
        let pears = page.query(&Locator::xpath("/html/body/div/ul/li[2]")).unwrap();
        assert_eq!(page.get(pears[0]).unwrap().text, "Pears");
        let anchored = page
            .query(&Locator::xpath(r#"//*[@id="app"]/ul[1]/li[3]/a[1]"#))
            .unwrap();
        assert_eq!(tags(&page, &anchored), vec!["a"]);
        assert_eq!(page.count(&Locator::xpath("//li")).unwrap(), 3);
        assert_eq!(page.count(&Locator::xpath("//li[1]")).unwrap(), 1);
    }

    #[test]
    fn test_text_matches_deepest_element() {
        let page = page();
        let exact = page.query(&Locator::text(r#"text="Pears""#)).unwrap();
        assert_eq!(tags(&page, &exact), vec!["li"]);
        let nested = page.query(&Locator::text(r#"text="in""#)).unwrap();
        assert_eq!(tags(&page, &nested), vec!["span"]);
        let scoped = page
            .query(&Locator::text(r#"button >> text*="Sign""#))
            .unwrap();
        assert_eq!(tags(&page, &scoped), vec!["button"]);
        assert_eq!(page.count(&Locator::text(r#"text*="e""#)).unwrap(), 3);
    }

    #[test]
    fn test_text_may_contain_scope_marker() {
        let page = Page::parse(indoc! { r#"
            <nav><a href="/">Home >> Products</a></nav>
            <p>a >> b</p>
            "# })
        .unwrap();
        let crumb = page
            .query(&Locator::text(r#"text="Home >> Products""#))
            .unwrap();
        assert_eq!(tags(&page, &crumb), vec!["a"]);
        let scoped = page
            .query(&Locator::text(r#"p >> text*=">> b""#))
            .unwrap();
        assert_eq!(tags(&page, &scoped), vec!["p"]);
        let nav = page
            .query(&Locator::text(r#"nav >> text="Home >> Products""#))
            .unwrap();
        assert_eq!(tags(&page, &nav), vec!["nav"]);
        assert!(page.query(&Locator::text(r#"a >> b >> text="x""#)).is_err());
    }

    #[test]
    fn test_roles() {
        let page = page();
        assert_eq!(page.count(&Locator::role("role=textbox")).unwrap(), 1);
        assert_eq!(page.count(&Locator::role("role=button")).unwrap(), 2);
        assert_eq!(
            page.count(&Locator::role(r#"role=button[name="Close dialog"]"#))
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_malformed_locators_are_errors() {
        let page = page();
        assert!(matches!(
            page.query(&Locator::css("div[")),
            Err(QueryError::Syntax { .. })
        ));
        assert!(matches!(
            page.query(&Locator::css("a:hover(1)")),
            Err(QueryError::Unsupported { .. })
        ));
        assert!(page.query(&Locator::xpath("//li[text()]")).is_err());
        assert!(page.query(&Locator::xpath("li")).is_err());
        assert!(page.query(&Locator::text(r#"text="open"#)).is_err());
        assert!(page.query(&Locator::role("button")).is_err());
    }

    #[test]
    fn test_escaped_strings_round_trip() {
        let page =
            Page::parse(r#"<p title='say "hi"'>x</p><p title="a\b">y</p>"#)
                .unwrap();
        let quoted = crate::locator::quote(r#"say "hi""#);
        assert_eq!(page.count(&Locator::css(format!("p[title={}]", quoted))).unwrap(), 1);
        let backslash = crate::locator::quote(r"a\b");
        assert_eq!(page.count(&Locator::css(format!("p[title={}]", backslash))).unwrap(), 1);
    }

    #[test]
    fn test_anchor_detection() {
        let parsed = parse(&Locator::css("#app > ul")).unwrap();
        assert!(parsed.is_id_anchored());
        let parsed = parse(&Locator::xpath(r#"//*[@id="app"]/ul[1]"#)).unwrap();
        assert!(parsed.is_id_anchored());
        let parsed = parse(&Locator::css(r#"[data-testid="x"]"#)).unwrap();
        assert!(!parsed.is_id_anchored());
        assert!(parsed.references_attribute("data-testid"));
    }
}
