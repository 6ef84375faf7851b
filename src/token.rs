//! # Navigation Token Module
//!
//! Every inline button carries a compact token describing where the press
//! should lead. Tokens hold numeric ids only, so renaming a catalog entity
//! never invalidates a button that is already on screen.
//!
//! Wire layout: a one-letter tag followed by `:`-separated fields. Optional
//! fields are encoded as empty strings. Each tag owns its arity, so a token of
//! one shape never decodes as another.

use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

/// Telegram refuses callback data longer than 64 bytes
pub const MAX_TOKEN_BYTES: usize = 64;

const SEPARATOR: char = ':';

/// Errors produced while encoding or decoding a navigation token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is empty")]
    Empty,
    #[error("unknown token tag: {0}")]
    UnknownTag(String),
    #[error("token tag {tag} expects {expected} fields, got {actual}")]
    Arity {
        tag: String,
        expected: usize,
        actual: usize,
    },
    #[error("malformed number in token: {0}")]
    Number(String),
    #[error("malformed origin in token")]
    Origin,
    #[error("encoded token is {0} bytes, over the 64 byte limit")]
    TooLong(usize),
}

impl From<ParseIntError> for TokenError {
    fn from(err: ParseIntError) -> Self {
        TokenError::Number(err.to_string())
    }
}

/// The menu level a side flow (search, rating, content view) was entered from
///
/// Stores scoping keys only, never a pre-resolved screen, so the way back is
/// always recomputed from current catalog data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    Root,
    Path {
        path: i64,
    },
    Category {
        path: i64,
        category: i64,
    },
    Content {
        path: i64,
        category: i64,
        /// `None` means every topic under the category
        topic: Option<i64>,
    },
}

/// A decoded button payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavToken {
    /// Root menu listing all paths
    Root,
    /// Categories under a path
    Path { path: i64, page: u32 },
    /// Topics under a category (auto-skips to content when there are none)
    Category { path: i64, category: i64, page: u32 },
    /// Content list under a category, optionally narrowed to one topic
    Content {
        path: i64,
        category: i64,
        topic: Option<i64>,
        page: u32,
    },
    /// Description of a single content item
    Detail { origin: Origin, content: i64 },
    /// One window of a text item
    Read {
        origin: Origin,
        content: i64,
        page: u32,
    },
    /// Out-of-band delivery of a media item
    Media { origin: Origin, content: i64 },
    /// Start a free-text search from the given level
    Search { origin: Origin },
    /// Another page of the most recent search results
    SearchPage { page: u32 },
    /// Start rating an item; `page` is set when started from the reader
    Rate {
        origin: Origin,
        content: i64,
        page: Option<u32>,
    },
    /// A numeric rating choice
    Score { value: i16 },
    /// Inert button such as the page counter
    Noop,
}

impl NavToken {
    fn tag(&self) -> &'static str {
        match self {
            NavToken::Root => "r",
            NavToken::Path { .. } => "p",
            NavToken::Category { .. } => "c",
            NavToken::Content { .. } => "l",
            NavToken::Detail { .. } => "d",
            NavToken::Read { .. } => "x",
            NavToken::Media { .. } => "m",
            NavToken::Search { .. } => "s",
            NavToken::SearchPage { .. } => "q",
            NavToken::Rate { .. } => "a",
            NavToken::Score { .. } => "v",
            NavToken::Noop => "n",
        }
    }

    /// Encode into callback data, failing instead of truncating when the
    /// result would not fit into [`MAX_TOKEN_BYTES`]
    pub fn encode(&self) -> Result<String, TokenError> {
        let mut out = String::from(self.tag());
        let mut field = |value: &dyn std::fmt::Display| {
            let _ = write!(out, "{SEPARATOR}{value}");
        };

        match *self {
            NavToken::Root | NavToken::Noop => {}
            NavToken::Path { path, page } => {
                field(&path);
                field(&page);
            }
            NavToken::Category {
                path,
                category,
                page,
            } => {
                field(&path);
                field(&category);
                field(&page);
            }
            NavToken::Content {
                path,
                category,
                topic,
                page,
            } => {
                field(&path);
                field(&category);
                field(&OptField(topic));
                field(&page);
            }
            NavToken::Detail { origin, content } | NavToken::Media { origin, content } => {
                field(&OriginFields(origin));
                field(&content);
            }
            NavToken::Read {
                origin,
                content,
                page,
            } => {
                field(&OriginFields(origin));
                field(&content);
                field(&page);
            }
            NavToken::Search { origin } => field(&OriginFields(origin)),
            NavToken::SearchPage { page } => field(&page),
            NavToken::Rate {
                origin,
                content,
                page,
            } => {
                field(&OriginFields(origin));
                field(&content);
                field(&OptField(page));
            }
            NavToken::Score { value } => field(&value),
        }

        if out.len() > MAX_TOKEN_BYTES {
            return Err(TokenError::TooLong(out.len()));
        }
        Ok(out)
    }

    /// Decode callback data; never panics on foreign or corrupted input
    pub fn decode(data: &str) -> Result<Self, TokenError> {
        if data.is_empty() {
            return Err(TokenError::Empty);
        }
        if data.len() > MAX_TOKEN_BYTES {
            return Err(TokenError::TooLong(data.len()));
        }

        let mut parts = data.split(SEPARATOR);
        let tag = parts.next().unwrap_or_default();
        let fields: Vec<&str> = parts.collect();

        let expect = |expected: usize| {
            if fields.len() == expected {
                Ok(())
            } else {
                Err(TokenError::Arity {
                    tag: tag.to_string(),
                    expected,
                    actual: fields.len(),
                })
            }
        };

        let token = match tag {
            "r" => {
                expect(0)?;
                NavToken::Root
            }
            "n" => {
                expect(0)?;
                NavToken::Noop
            }
            "p" => {
                expect(2)?;
                NavToken::Path {
                    path: number(fields[0])?,
                    page: number(fields[1])?,
                }
            }
            "c" => {
                expect(3)?;
                NavToken::Category {
                    path: number(fields[0])?,
                    category: number(fields[1])?,
                    page: number(fields[2])?,
                }
            }
            "l" => {
                expect(4)?;
                NavToken::Content {
                    path: number(fields[0])?,
                    category: number(fields[1])?,
                    topic: optional(fields[2])?,
                    page: number(fields[3])?,
                }
            }
            "d" => {
                expect(5)?;
                NavToken::Detail {
                    origin: decode_origin(&fields[..4])?,
                    content: number(fields[4])?,
                }
            }
            "m" => {
                expect(5)?;
                NavToken::Media {
                    origin: decode_origin(&fields[..4])?,
                    content: number(fields[4])?,
                }
            }
            "x" => {
                expect(6)?;
                NavToken::Read {
                    origin: decode_origin(&fields[..4])?,
                    content: number(fields[4])?,
                    page: number(fields[5])?,
                }
            }
            "s" => {
                expect(4)?;
                NavToken::Search {
                    origin: decode_origin(&fields)?,
                }
            }
            "q" => {
                expect(1)?;
                NavToken::SearchPage {
                    page: number(fields[0])?,
                }
            }
            "a" => {
                expect(6)?;
                NavToken::Rate {
                    origin: decode_origin(&fields[..4])?,
                    content: number(fields[4])?,
                    page: optional(fields[5])?,
                }
            }
            "v" => {
                expect(1)?;
                NavToken::Score {
                    value: number(fields[0])?,
                }
            }
            other => return Err(TokenError::UnknownTag(other.to_string())),
        };

        Ok(token)
    }
}

struct OptField<T>(Option<T>);

impl<T: std::fmt::Display> std::fmt::Display for OptField<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(value) => write!(f, "{value}"),
            None => Ok(()),
        }
    }
}

/// Origins always occupy four fields: level letter, path, category, topic
struct OriginFields(Origin);

impl std::fmt::Display for OriginFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Origin::Root => write!(f, "r:::"),
            Origin::Path { path } => write!(f, "p:{path}::"),
            Origin::Category { path, category } => write!(f, "c:{path}:{category}:"),
            Origin::Content {
                path,
                category,
                topic,
            } => write!(f, "l:{path}:{category}:{}", OptField(topic)),
        }
    }
}

fn decode_origin(fields: &[&str]) -> Result<Origin, TokenError> {
    let [level, path, category, topic] = fields else {
        return Err(TokenError::Origin);
    };

    let origin = match (*level, path.is_empty(), category.is_empty(), topic.is_empty()) {
        ("r", true, true, true) => Origin::Root,
        ("p", false, true, true) => Origin::Path {
            path: number(path)?,
        },
        ("c", false, false, true) => Origin::Category {
            path: number(path)?,
            category: number(category)?,
        },
        ("l", false, false, _) => Origin::Content {
            path: number(path)?,
            category: number(category)?,
            topic: optional(topic)?,
        },
        _ => return Err(TokenError::Origin),
    };
    Ok(origin)
}

/// Strict integer parsing: only an optional leading `-` and ASCII digits, so
/// every value has exactly one textual form
fn number<T: FromStr<Err = ParseIntError>>(field: &str) -> Result<T, TokenError> {
    let digits = field.strip_prefix('-').unwrap_or(field);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TokenError::Number(field.to_string()));
    }
    Ok(field.parse()?)
}

fn optional<T: FromStr<Err = ParseIntError>>(field: &str) -> Result<Option<T>, TokenError> {
    if field.is_empty() {
        Ok(None)
    } else {
        number(field).map(Some)
    }
}
