//! Select expression language of the attribute store.
//!
//! ```text
//! select (* | itemName() | count(*) | name [, name]*) from domain
//!     [where predicate (and predicate)*]
//!     [order by name [asc | desc]]
//!     [limit n]
//! ```
//!
//! Names are back-quoted (a doubled back-quote escapes one) or bare words;
//! `itemName()` refers to the item locator. Values are single-quoted (a
//! doubled quote escapes one). All comparisons are lexicographic, and a
//! predicate on a multi-valued attribute holds when any value satisfies it.
//!
//! In a `like` pattern `%` matches any run of characters and `_` matches one
//! character. An optional `escape 'c'` clause names a character that makes
//! the character after it literal:
//!
//! ```text
//! name [not] like 'pattern' [escape 'c']
//! ```

use crate::error::{StorageError, StorageResult};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Quotes an attribute or domain name.
pub fn quote_name(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quotes a literal value.
pub fn quote_value(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// What a select returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Every attribute.
    All,
    /// Only item names.
    ItemName,
    /// The number of matching items.
    Count,
    /// The listed attributes.
    Attributes(Vec<String>),
}

/// A name in a predicate or order clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Name {
    /// The item locator.
    ItemName,
    /// A stored attribute.
    Attribute(String),
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// One conjunct of the where clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `name op 'value'`
    Compare {
        /// Left-hand name.
        name: Name,
        /// Operator.
        op: CompareOp,
        /// Right-hand literal.
        value: String,
    },
    /// `name [not] like 'pattern' [escape 'c']`
    Like {
        /// Left-hand name.
        name: Name,
        /// Pattern.
        pattern: String,
        /// Escape character, if any.
        escape: Option<char>,
        /// `not like`
        negated: bool,
    },
    /// `name is [not] null`
    IsNull {
        /// Tested name.
        name: Name,
        /// `is not null`
        negated: bool,
    },
    /// `name between 'low' and 'high'`, inclusive.
    Between {
        /// Tested name.
        name: Name,
        /// Lower bound.
        low: String,
        /// Upper bound.
        high: String,
    },
    /// `name in ('a', 'b', ...)`
    In {
        /// Tested name.
        name: Name,
        /// Candidate values.
        values: Vec<String>,
    },
}

impl Predicate {
    /// Evaluates the predicate against one item.
    pub fn matches(&self, item_name: &str, attributes: &BTreeMap<String, Vec<String>>) -> bool {
        match self {
            Predicate::Compare { name, op, value } => values_of(name, item_name, attributes)
                .any(|v| op.holds(v.cmp(value.as_str()))),
            Predicate::Like {
                name,
                pattern,
                escape,
                negated,
            } => {
                let glob = compile_like(pattern, *escape);
                values_of(name, item_name, attributes).any(|v| glob_match(v, &glob) != *negated)
            }
            Predicate::IsNull { name, negated } => {
                let absent = values_of(name, item_name, attributes).next().is_none();
                absent != *negated
            }
            Predicate::Between { name, low, high } => values_of(name, item_name, attributes)
                .any(|v| v >= low.as_str() && v <= high.as_str()),
            Predicate::In { name, values } => {
                values_of(name, item_name, attributes).any(|v| values.iter().any(|c| c == v))
            }
        }
    }
}

/// Sort clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    /// Sort name.
    pub name: Name,
    /// Ascending when true.
    pub ascending: bool,
}

/// A parsed select statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectExpression {
    /// Projection.
    pub output: Output,
    /// Source domain.
    pub domain: String,
    /// Conjunction of predicates.
    pub predicates: Vec<Predicate>,
    /// Optional ordering.
    pub order_by: Option<SortOrder>,
    /// Optional page size.
    pub limit: Option<usize>,
}

impl SelectExpression {
    /// Parses a select statement.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidExpression`] if the text is not a
    /// valid statement.
    pub fn parse(text: &str) -> StorageResult<Self> {
        let tokens = tokenize(text).map_err(|msg| StorageError::invalid_expression(text, msg))?;
        Parser { tokens, pos: 0 }
            .statement()
            .map_err(|msg| StorageError::invalid_expression(text, msg))
    }

    /// Evaluates the where clause against one item.
    pub fn matches(&self, item_name: &str, attributes: &BTreeMap<String, Vec<String>>) -> bool {
        self.predicates
            .iter()
            .all(|p| p.matches(item_name, attributes))
    }

    /// Returns the value an item sorts by, if the statement is ordered.
    pub fn sort_value<'a>(
        &self,
        item_name: &'a str,
        attributes: &'a BTreeMap<String, Vec<String>>,
    ) -> Option<&'a str> {
        let order = self.order_by.as_ref()?;
        values_of(&order.name, item_name, attributes).next()
    }
}

fn values_of<'a>(
    name: &Name,
    item_name: &'a str,
    attributes: &'a BTreeMap<String, Vec<String>>,
) -> Box<dyn Iterator<Item = &'a str> + 'a> {
    match name {
        Name::ItemName => Box::new(std::iter::once(item_name)),
        Name::Attribute(attr) => Box::new(
            attributes
                .get(attr.as_str())
                .into_iter()
                .flatten()
                .map(String::as_str),
        ),
    }
}

/// Escapes `%`, `_` and `escape` itself so `text` matches only literally
/// in a `like` pattern using `escape` as its escape character.
pub fn escape_like(text: &str, escape: char) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '%' || c == '_' || c == escape {
            out.push(escape);
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Glob {
    Any,
    One,
    Char(char),
}

fn compile_like(pattern: &str, escape: Option<char>) -> Vec<Glob> {
    let mut glob = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        glob.push(match c {
            c if Some(c) == escape => Glob::Char(chars.next().unwrap_or(c)),
            '%' => Glob::Any,
            '_' => Glob::One,
            c => Glob::Char(c),
        });
    }
    glob
}

fn glob_match(text: &str, glob: &[Glob]) -> bool {
    let text: Vec<char> = text.chars().collect();
    let (mut t, mut g) = (0, 0);
    // Last `%` seen and the text position it currently absorbs up to.
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match glob.get(g) {
            Some(Glob::Any) => {
                star = Some((g, t));
                g += 1;
                continue;
            }
            Some(Glob::One) => {
                t += 1;
                g += 1;
                continue;
            }
            Some(Glob::Char(c)) if *c == text[t] => {
                t += 1;
                g += 1;
                continue;
            }
            _ => {}
        }
        match star {
            Some((star_g, star_t)) => {
                g = star_g + 1;
                t = star_t + 1;
                star = Some((star_g, star_t + 1));
            }
            None => return false,
        }
    }
    glob[g..].iter().all(|x| *x == Glob::Any)
}

#[cfg(test)]
fn like_match(text: &str, pattern: &str, escape: Option<char>) -> bool {
    glob_match(text, &compile_like(pattern, escape))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Name(String),
    Literal(String),
    Symbol(&'static str),
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '`' | '\'' | '"' => {
                chars.next();
                let mut out = String::new();
                loop {
                    match chars.next() {
                        Some(q) if q == c => {
                            if chars.peek() == Some(&c) {
                                chars.next();
                                out.push(c);
                            } else {
                                break;
                            }
                        }
                        Some(other) => out.push(other),
                        None => return Err(format!("unterminated {c}-quoted text")),
                    }
                }
                tokens.push(if c == '`' {
                    Token::Name(out)
                } else {
                    Token::Literal(out)
                });
            }
            '(' | ')' | ',' | '*' | '=' => {
                chars.next();
                tokens.push(Token::Symbol(match c {
                    '(' => "(",
                    ')' => ")",
                    ',' => ",",
                    '*' => "*",
                    _ => "=",
                }));
            }
            '!' | '<' | '>' => {
                chars.next();
                let with_eq = chars.peek() == Some(&'=');
                if with_eq {
                    chars.next();
                }
                let symbol = match (c, with_eq) {
                    ('!', true) => "!=",
                    ('<', true) => "<=",
                    ('>', true) => ">=",
                    ('<', false) => "<",
                    ('>', false) => ">",
                    _ => return Err("expected '=' after '!'".to_string()),
                };
                tokens.push(Token::Symbol(symbol));
            }
            c if c.is_alphanumeric() || c == '_' || c == '$' => {
                let mut word = String::new();
                while let Some(&w) = chars.peek() {
                    if w.is_alphanumeric() || w == '_' || w == '$' {
                        word.push(w);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word));
            }
            other => return Err(format!("unexpected character {other:?}")),
        }
    }

    Ok(tokens)
}

const KEYWORDS: &[&str] = &[
    "select", "from", "where", "and", "or", "not", "like", "is", "null", "between", "in",
    "order", "by", "asc", "desc", "limit", "escape",
];

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), String> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(format!("expected '{keyword}', found {:?}", self.peek()))
        }
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<(), String> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(format!("expected '{symbol}', found {:?}", self.peek()))
        }
    }

    /// Consumes `word ( )` or `word ( * )` style function calls.
    fn eat_call(&mut self, function: &str, star: bool) -> Result<bool, String> {
        let is_call = self.at_keyword(function)
            && matches!(self.tokens.get(self.pos + 1), Some(Token::Symbol("(")));
        if !is_call {
            return Ok(false);
        }
        self.pos += 2;
        if star {
            self.expect_symbol("*")?;
        }
        self.expect_symbol(")")?;
        Ok(true)
    }

    fn statement(mut self) -> Result<SelectExpression, String> {
        self.expect_keyword("select")?;
        let output = self.output()?;
        self.expect_keyword("from")?;
        let domain = self.identifier()?;

        let mut predicates = Vec::new();
        if self.eat_keyword("where") {
            predicates.push(self.predicate()?);
            while self.eat_keyword("and") {
                predicates.push(self.predicate()?);
            }
        }

        let mut order_by = None;
        if self.eat_keyword("order") {
            self.expect_keyword("by")?;
            let name = self.name()?;
            let ascending = if self.eat_keyword("desc") {
                false
            } else {
                self.eat_keyword("asc");
                true
            };
            order_by = Some(SortOrder { name, ascending });
        }

        let mut limit = None;
        if self.eat_keyword("limit") {
            match self.next() {
                Some(Token::Word(w)) => {
                    limit = Some(w.parse::<usize>().map_err(|e| format!("bad limit: {e}"))?);
                }
                other => return Err(format!("expected limit value, found {other:?}")),
            }
        }

        match self.peek() {
            None => Ok(SelectExpression {
                output,
                domain,
                predicates,
                order_by,
                limit,
            }),
            Some(extra) => Err(format!("unexpected trailing token {extra:?}")),
        }
    }

    fn output(&mut self) -> Result<Output, String> {
        if self.eat_symbol("*") {
            return Ok(Output::All);
        }
        if self.eat_call("count", true)? {
            return Ok(Output::Count);
        }
        if self.eat_call("itemName", false)? {
            return Ok(Output::ItemName);
        }

        let mut names = vec![self.identifier()?];
        while self.eat_symbol(",") {
            names.push(self.identifier()?);
        }
        Ok(Output::Attributes(names))
    }

    fn identifier(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Token::Name(name)) => Ok(name),
            Some(Token::Word(word))
                if !KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(&word)) =>
            {
                Ok(word)
            }
            other => Err(format!("expected a name, found {other:?}")),
        }
    }

    fn name(&mut self) -> Result<Name, String> {
        if self.eat_call("itemName", false)? {
            return Ok(Name::ItemName);
        }
        self.identifier().map(Name::Attribute)
    }

    fn literal(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Token::Literal(value)) => Ok(value),
            other => Err(format!("expected a quoted value, found {other:?}")),
        }
    }

    fn predicate(&mut self) -> Result<Predicate, String> {
        let name = self.name()?;

        if self.eat_keyword("is") {
            let negated = self.eat_keyword("not");
            self.expect_keyword("null")?;
            return Ok(Predicate::IsNull { name, negated });
        }
        let negated = self.eat_keyword("not");
        if negated {
            self.expect_keyword("like")?;
        }
        if negated || self.eat_keyword("like") {
            let pattern = self.literal()?;
            let escape = if self.eat_keyword("escape") {
                let text = self.literal()?;
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => return Err(format!("escape must be one character, found {text:?}")),
                }
            } else {
                None
            };
            return Ok(Predicate::Like {
                name,
                pattern,
                escape,
                negated,
            });
        }
        if self.eat_keyword("between") {
            let low = self.literal()?;
            self.expect_keyword("and")?;
            let high = self.literal()?;
            return Ok(Predicate::Between { name, low, high });
        }
        if self.eat_keyword("in") {
            self.expect_symbol("(")?;
            let mut values = vec![self.literal()?];
            while self.eat_symbol(",") {
                values.push(self.literal()?);
            }
            self.expect_symbol(")")?;
            return Ok(Predicate::In { name, values });
        }

        let op = match self.next() {
            Some(Token::Symbol("=")) => CompareOp::Eq,
            Some(Token::Symbol("!=")) => CompareOp::Ne,
            Some(Token::Symbol("<")) => CompareOp::Lt,
            Some(Token::Symbol("<=")) => CompareOp::Le,
            Some(Token::Symbol(">")) => CompareOp::Gt,
            Some(Token::Symbol(">=")) => CompareOp::Ge,
            other => return Err(format!("expected an operator, found {other:?}")),
        };
        let value = self.literal()?;
        Ok(Predicate::Compare { name, op, value })
    }
}
