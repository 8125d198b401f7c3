//! Export bundle parsing.
//!
//! Two mutually exclusive grammars cover the raw exports, selected by a fixed
//! release-version threshold: releases before 1.13 ship the flat SRG encoding
//! (independent `CL:`/`FD:`/`MD:` lines, members addressed by slash-delimited
//! paths), 1.13 and later the hierarchical TSRG encoding (unindented class
//! lines, tab-indented member lines disambiguated by token count). Both
//! produce the same unresolved forest: classes owning fields, methods and
//! constructors with no human names attached yet.

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::model::{Class, Field, Method, Side};
use crate::version::VersionKey;

/// Grammar generation of one version's export bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatGeneration {
    Srg,
    Tsrg,
}

static TSRG_THRESHOLD: LazyLock<VersionKey> =
    LazyLock::new(|| "1.13".parse().expect("static version literal"));

impl FormatGeneration {
    pub fn for_version(version: &VersionKey) -> Self {
        if *version >= *TSRG_THRESHOLD {
            FormatGeneration::Tsrg
        } else {
            FormatGeneration::Srg
        }
    }
}

// Intermediate names generated for methods and parameters embed a numeric id
// behind an optional literal prefix. The id, not the full name, is the join
// key for parameter overrides.
static METHOD_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:func_)?(\d+)_(\w+)_?").unwrap());
static PARAM_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:p_)?(\d+)_(\d+)_?").unwrap());
static CONSTRUCTOR_PARAM_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:p_i)?(\d+)_(\d+)_?").unwrap());

/// Numeric id embedded in a method intermediate name (`func_70071_h_` → `70071`).
pub fn method_id(intermediate_name: &str) -> Option<&str> {
    METHOD_ID
        .captures(intermediate_name)
        .map(|c| c.get(1).unwrap().as_str())
}

/// `(method_id, parameter_index)` from a plain parameter token
/// (`p_70071_2_` → `("70071", 2)`). `p_i`-prefixed constructor tokens do not
/// match: the `i` defeats the digit run.
pub fn param_key(token: &str) -> Option<(&str, u32)> {
    let captures = PARAM_KEY.captures(token)?;
    let index = captures.get(2).unwrap().as_str().parse().ok()?;
    Some((captures.get(1).unwrap().as_str(), index))
}

/// `(method_id, parameter_index)` from a constructor parameter token
/// (`p_i1964_1_` → `("1964", 1)`).
pub fn constructor_param_key(token: &str) -> Option<(&str, u32)> {
    let captures = CONSTRUCTOR_PARAM_KEY.captures(token)?;
    let index = captures.get(2).unwrap().as_str().parse().ok()?;
    Some((captures.get(1).unwrap().as_str(), index))
}

/// One constructor declaration, normalized across both table formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorRow {
    pub method_id: String,
    pub owner: String,
    pub signature: String,
}

/// Parse one version's export into an unresolved forest.
pub fn parse(
    generation: FormatGeneration,
    export: &str,
    static_methods: &str,
    constructor_table: Option<&str>,
) -> Result<Vec<Class>> {
    let statics = parse_static_methods(static_methods);
    let constructors = match constructor_table {
        Some(text) => parse_constructor_table(generation, text)?,
        None => HashMap::new(),
    };
    let mut classes = match generation {
        FormatGeneration::Srg => parse_flat(export, &statics)?,
        FormatGeneration::Tsrg => parse_hierarchical(export, &statics)?,
    };
    attach_constructors(&mut classes, constructors);
    Ok(classes)
}

/// Newline-delimited list of intermediate method names that are static.
pub fn parse_static_methods(text: &str) -> HashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_constructor_table(
    generation: FormatGeneration,
    text: &str,
) -> Result<HashMap<String, Vec<ConstructorRow>>> {
    match generation {
        FormatGeneration::Tsrg => parse_constructors_tsrg(text),
        FormatGeneration::Srg => parse_constructors_exc(text),
    }
}

/// `constructors.txt` rows: `<id> <class> <signature>`.
fn parse_constructors_tsrg(text: &str) -> Result<HashMap<String, Vec<ConstructorRow>>> {
    let mut rows: HashMap<String, Vec<ConstructorRow>> = HashMap::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split(' ').collect();
        if tokens.len() != 3 {
            bail!(
                "constructor table line {}: expected 3 tokens, found {}",
                idx + 1,
                tokens.len()
            );
        }
        rows.entry(tokens[1].to_string())
            .or_default()
            .push(ConstructorRow {
                method_id: tokens[0].to_string(),
                owner: tokens[1].to_string(),
                signature: tokens[2].to_string(),
            });
    }
    Ok(rows)
}

/// `joined.exc` lines of the shape
/// `<class>.<init>(<sig>)V=|p_i<id>_<n>_,...` — only lines carrying a `V=|`
/// parameter list describe constructors, and the numeric id lives in the
/// `p_i` parameter tokens.
fn parse_constructors_exc(text: &str) -> Result<HashMap<String, Vec<ConstructorRow>>> {
    let mut rows: HashMap<String, Vec<ConstructorRow>> = HashMap::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        let Some(marker) = line.find("V=|") else {
            continue;
        };
        let lparen = line
            .find('(')
            .with_context(|| format!("constructor table line {}: missing '('", idx + 1))?;
        let dot = line
            .find('.')
            .with_context(|| format!("constructor table line {}: missing '.'", idx + 1))?;
        if dot > lparen {
            bail!("constructor table line {}: malformed member path", idx + 1);
        }
        let owner = &line[..dot];
        let signature = &line[lparen..marker];
        let params = &line[marker + 3..];
        // Regular void methods land in this file too; only p_i tokens mark a
        // constructor.
        let Some(method_id) = params
            .split(',')
            .find_map(|token| constructor_param_key(token).map(|(id, _)| id))
        else {
            continue;
        };
        rows.entry(owner.to_string())
            .or_default()
            .push(ConstructorRow {
                method_id: method_id.to_string(),
                owner: owner.to_string(),
                signature: signature.to_string(),
            });
    }
    Ok(rows)
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn split_member_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => ("", path),
    }
}

fn parse_flat(export: &str, statics: &HashSet<String>) -> Result<Vec<Class>> {
    let mut classes: Vec<Class> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (idx, raw) in export.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("CL: ") {
            let tokens: Vec<&str> = rest.split(' ').collect();
            if tokens.len() != 2 {
                bail!(
                    "line {}: class line expects 2 tokens, found {}",
                    idx + 1,
                    tokens.len()
                );
            }
            let class = Class::unresolved(Some(tokens[0].to_string()), tokens[1].to_string());
            index.insert(class.intermediate_name.clone(), classes.len());
            classes.push(class);
        } else if let Some(rest) = line.strip_prefix("FD: ") {
            let tokens: Vec<&str> = rest.split(' ').collect();
            if tokens.len() != 2 {
                bail!(
                    "line {}: field line expects 2 tokens, found {}",
                    idx + 1,
                    tokens.len()
                );
            }
            let (owner, member) = split_member_path(tokens[1]);
            let slot = *index.get(owner).with_context(|| {
                format!(
                    "line {}: field {member} names unknown class {owner:?}",
                    idx + 1
                )
            })?;
            classes[slot].fields.push(Field::unresolved(
                Some(last_segment(tokens[0]).to_string()),
                member.to_string(),
            ));
        } else if let Some(rest) = line.strip_prefix("MD: ") {
            let tokens: Vec<&str> = rest.split(' ').collect();
            if tokens.len() != 4 {
                bail!(
                    "line {}: method line expects 4 tokens, found {}",
                    idx + 1,
                    tokens.len()
                );
            }
            let (owner, member) = split_member_path(tokens[2]);
            let slot = *index.get(owner).with_context(|| {
                format!(
                    "line {}: method {member} names unknown class {owner:?}",
                    idx + 1
                )
            })?;
            let is_static = statics.contains(member);
            classes[slot].methods.push(Method::unresolved(
                Some(last_segment(tokens[0]).to_string()),
                member.to_string(),
                tokens[3].to_string(),
                is_static,
            ));
        }
        // Other tags (PK: package lines) carry nothing we keep.
    }

    Ok(classes)
}

fn parse_hierarchical(export: &str, statics: &HashSet<String>) -> Result<Vec<Class>> {
    let mut classes: Vec<Class> = Vec::new();

    for (idx, raw) in export.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        if let Some(member) = line.strip_prefix('\t') {
            let Some(class) = classes.last_mut() else {
                bail!("line {}: member line before any class", idx + 1);
            };
            let tokens: Vec<&str> = member.split(' ').collect();
            match tokens.len() {
                2 => class.fields.push(Field::unresolved(
                    Some(tokens[0].to_string()),
                    tokens[1].to_string(),
                )),
                3 => {
                    let is_static = statics.contains(tokens[2]);
                    class.methods.push(Method::unresolved(
                        Some(tokens[0].to_string()),
                        tokens[2].to_string(),
                        tokens[1].to_string(),
                        is_static,
                    ));
                }
                n => bail!(
                    "line {}: member line expects 2 or 3 tokens, found {n}",
                    idx + 1
                ),
            }
        } else {
            let tokens: Vec<&str> = line.split(' ').collect();
            if tokens.len() != 2 {
                bail!(
                    "line {}: class line expects 2 tokens, found {}",
                    idx + 1,
                    tokens.len()
                );
            }
            classes.push(Class::unresolved(
                Some(tokens[0].to_string()),
                tokens[1].to_string(),
            ));
        }
    }

    Ok(classes)
}

/// Constructors become methods with the numeric id as intermediate name and
/// the owning class as human name. Rows naming undeclared classes are unused.
fn attach_constructors(classes: &mut [Class], mut rows: HashMap<String, Vec<ConstructorRow>>) {
    for class in classes.iter_mut() {
        let Some(class_rows) = rows.remove(&class.intermediate_name) else {
            continue;
        };
        for row in class_rows {
            class.constructors.push(Method {
                original_name: None,
                intermediate_name: row.method_id,
                signature: row.signature,
                name: Some(row.owner),
                description: None,
                side: Side::Both,
                is_static: false,
                parameters: Vec::new(),
            });
        }
    }
}
