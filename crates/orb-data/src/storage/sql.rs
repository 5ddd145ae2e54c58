//! 동적 SQL 도우미.
//!
//! 테이블/컬럼 이름은 설정과 업로드 헤더에서 오므로 바인딩할 수 없습니다.
//! 검증 후 큰따옴표로 감싸서만 쿼리에 넣습니다.

use orb_core::ValidationError;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

use crate::ingest::Value;

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// 단일 식별자를 검증하고 인용합니다 (`Nifty50` → `"Nifty50"`).
pub(crate) fn quote_ident(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if !is_identifier(name) {
        return Err(ValidationError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

/// 스키마 한정 이름을 부분별로 검증하고 인용합니다 (`public.Nifty50` → `"public"."Nifty50"`).
pub(crate) fn quote_qualified(name: &str) -> Result<String, ValidationError> {
    let parts = name
        .trim()
        .split('.')
        .map(|p| {
            let p = p.trim().trim_matches('"');
            quote_ident(p).map_err(|_| ValidationError::InvalidIdentifier(name.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join("."))
}

/// 값 하나를 바인딩합니다. `Null`은 호출자가 `NULL` 리터럴로 처리합니다.
pub(crate) fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Text(s) => query.bind(s.clone()),
        Value::Int(i) => query.bind(*i),
        Value::Decimal(d) => query.bind(*d),
        Value::Bool(b) => query.bind(*b),
        Value::Date(d) => query.bind(*d),
        Value::Time(t) => query.bind(*t),
        Value::DateTime(dt) => query.bind(*dt),
    }
}
