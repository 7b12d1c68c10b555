//! Identifiers, type names and type references.
//!
//! An identifier is a sequence of lower-case words. The same identifier can be
//! written in several formats (`point-x`, `point_x`, `pointX`), so parsing
//! splits on `-`, `_` and lower→upper camel boundaries and rendering is
//! driven by an [`IdFormat`]. Every word starts with a letter, which keeps
//! the camel formats unambiguous.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::ParseError;

/// Rendering mode for identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdFormat {
    /// `lower-hyphen` (canonical form).
    #[default]
    LowerHyphen,
    /// `lower_underscore`
    LowerUnderscore,
    /// `lowerCamel`
    LowerCamel,
    /// `UpperCamel`
    UpperCamel,
}

impl IdFormat {
    /// Mode name as used in codec option headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdFormat::LowerHyphen => "lower_hyphen",
            IdFormat::LowerUnderscore => "lower_underscore",
            IdFormat::LowerCamel => "lower_camel",
            IdFormat::UpperCamel => "upper_camel",
        }
    }
}

impl FromStr for IdFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lower_hyphen" => Ok(IdFormat::LowerHyphen),
            "lower_underscore" => Ok(IdFormat::LowerUnderscore),
            "lower_camel" => Ok(IdFormat::LowerCamel),
            "upper_camel" => Ok(IdFormat::UpperCamel),
            other => Err(ParseError::new(format!("Unknown id format \"{}\"", other))),
        }
    }
}

impl fmt::Display for IdFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field key or enum constant name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier {
    words: Vec<String>,
}

impl Identifier {
    /// Parse an identifier written in any supported format.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let first = match input.chars().next() {
            Some(c) => c,
            None => return Err(ParseError::new("Identifier is empty")),
        };
        if !first.is_ascii_alphabetic() {
            return Err(ParseError::new(format!(
                "Invalid identifier \"{}\": must start with a letter",
                input
            )));
        }

        let mut words = Vec::new();
        let mut current = String::new();
        let mut prev: Option<char> = None;

        for c in input.chars() {
            match c {
                '-' | '_' => {
                    if current.is_empty() {
                        return Err(ParseError::new(format!(
                            "Invalid identifier \"{}\": empty word",
                            input
                        )));
                    }
                    words.push(std::mem::take(&mut current));
                }
                c if c.is_ascii_alphanumeric() => {
                    let boundary = c.is_ascii_uppercase()
                        && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit());
                    if boundary && !current.is_empty() {
                        words.push(std::mem::take(&mut current));
                    }
                    if current.is_empty() && c.is_ascii_digit() {
                        return Err(ParseError::new(format!(
                            "Invalid identifier \"{}\": word must start with a letter",
                            input
                        )));
                    }
                    current.push(c.to_ascii_lowercase());
                }
                other => {
                    return Err(ParseError::new(format!(
                        "Invalid identifier \"{}\": unexpected character '{}'",
                        input, other
                    )));
                }
            }
            prev = Some(c);
        }

        if current.is_empty() {
            return Err(ParseError::new(format!(
                "Invalid identifier \"{}\": empty word",
                input
            )));
        }
        words.push(current);

        Ok(Self { words })
    }

    /// The lower-case words making up this identifier.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Render in the given format.
    pub fn format(&self, format: IdFormat) -> String {
        match format {
            IdFormat::LowerHyphen => self.words.join("-"),
            IdFormat::LowerUnderscore => self.words.join("_"),
            IdFormat::LowerCamel => {
                let mut out = String::new();
                for (i, word) in self.words.iter().enumerate() {
                    if i == 0 {
                        out.push_str(word);
                    } else {
                        push_capitalized(&mut out, word);
                    }
                }
                out
            }
            IdFormat::UpperCamel => {
                let mut out = String::new();
                for word in &self.words {
                    push_capitalized(&mut out, word);
                }
                out
            }
        }
    }
}

fn push_capitalized(out: &mut String, word: &str) {
    let mut chars = word.chars();
    if let Some(first) = chars.next() {
        out.push(first.to_ascii_uppercase());
        out.push_str(chars.as_str());
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(IdFormat::LowerHyphen))
    }
}

impl FromStr for Identifier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A dotted type name, e.g. `geometry.point`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeName {
    namespace: Vec<Identifier>,
    name: Identifier,
}

impl TypeName {
    pub fn new(namespace: Vec<Identifier>, name: Identifier) -> Self {
        Self { namespace, name }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parts = input
            .split('.')
            .map(Identifier::parse)
            .collect::<Result<Vec<_>, _>>()?;
        // split always yields at least one part
        let name = parts.pop().ok_or_else(|| ParseError::new("Type name is empty"))?;
        Ok(Self {
            namespace: parts,
            name,
        })
    }

    pub fn namespace(&self) -> &[Identifier] {
        &self.namespace
    }

    pub fn name(&self) -> &Identifier {
        &self.name
    }

    /// Whether the name carries a namespace.
    pub fn is_qualified(&self) -> bool {
        !self.namespace.is_empty()
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ns in &self.namespace {
            write!(f, "{}.", ns)?;
        }
        write!(f, "{}", self.name)
    }
}

/// A reference to a type: either a named type or a list of some type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Atomic(TypeName),
    List(Box<TypeRef>),
}

impl TypeRef {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        if let Some(inner) = input.strip_prefix('[') {
            let inner = inner.strip_suffix(']').ok_or_else(|| {
                ParseError::new(format!("Invalid type reference \"{}\": unclosed '['", input))
            })?;
            return Ok(TypeRef::List(Box::new(TypeRef::parse(inner)?)));
        }
        Ok(TypeRef::Atomic(TypeName::parse(input)?))
    }

    pub fn as_atomic(&self) -> Option<&TypeName> {
        match self {
            TypeRef::Atomic(name) => Some(name),
            TypeRef::List(_) => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Atomic(name) => write!(f, "{}", name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
        }
    }
}
