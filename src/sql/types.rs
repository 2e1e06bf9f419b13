//! SQL type text to vocabulary mapping.

use crate::vocabulary::DataType;

/// One word of a column type as written, e.g. `character`, `varying`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeWord {
    pub text: String,
    pub quoted: bool,
}

/// Normalized type text split into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    pub name: String,
    pub params: Option<String>,
    pub array_dims: usize,
}

/// Build the normalized type text for a parsed column.
///
/// Vocabulary keywords are uppercased (`character varying` becomes
/// `CHARACTER VARYING`). Other unquoted names are lowercased the way
/// PostgreSQL folds them; quoted names keep their case.
pub fn normalize_type(words: &[TypeWord], params: Option<&str>, array_dims: usize) -> String {
    let upper = words
        .iter()
        .map(|w| w.text.to_uppercase())
        .collect::<Vec<_>>()
        .join(" ");

    let all_unquoted = words.iter().all(|w| !w.quoted);
    let mut text = if all_unquoted && DataType::from_keyword(&upper).is_some() {
        upper
    } else {
        words
            .iter()
            .map(|w| {
                if w.quoted {
                    w.text.clone()
                } else {
                    w.text.to_lowercase()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    };

    if let Some(params) = params {
        text.push('(');
        text.push_str(params);
        text.push(')');
    }
    text.push_str(&"[]".repeat(array_dims));
    text
}

/// Split normalized type text back into name, parameters and array depth.
pub fn split_type(text: &str) -> TypeSpec {
    let mut rest = text.trim();
    let mut array_dims = 0;
    while let Some(stripped) = rest.strip_suffix("[]") {
        rest = stripped.trim_end();
        array_dims += 1;
    }

    let (name, params) = match (rest.find('('), rest.rfind(')')) {
        (Some(open), Some(close)) if close > open => {
            let params: String = rest[open + 1..close]
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            let name = format!("{} {}", rest[..open].trim(), rest[close + 1..].trim());
            (name.trim().to_string(), Some(params))
        }
        _ => (rest.to_string(), None),
    };

    TypeSpec {
        name,
        params: params.filter(|p| !p.is_empty()),
        array_dims,
    }
}

/// Map a type spec onto the vocabulary.
///
/// `enum_types` holds the names declared by `CREATE TYPE ... AS ENUM` in the
/// same script. Returns `None` when the name is not recognized.
pub fn resolve_type(spec: &TypeSpec, enum_types: &[String]) -> Option<DataType> {
    let base = DataType::from_keyword(&spec.name).or_else(|| {
        enum_types
            .iter()
            .find(|e| e.as_str() == spec.name || e.eq_ignore_ascii_case(&spec.name))
            .map(|e| DataType::Enum(e.clone()))
    })?;

    Some(wrap_array(base, spec.array_dims))
}

/// Resolve, falling back to [`DataType::Other`] for unrecognized names.
pub fn map_type(spec: &TypeSpec, enum_types: &[String]) -> DataType {
    resolve_type(spec, enum_types).unwrap_or_else(|| {
        wrap_array(DataType::Other(spec.name.clone()), spec.array_dims)
    })
}

fn wrap_array(mut ty: DataType, dims: usize) -> DataType {
    for _ in 0..dims {
        ty = DataType::Array(Box::new(ty));
    }
    ty
}
