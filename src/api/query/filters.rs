//! Where-clause building
//!
//! Layer queries take a SQL-92 `where` expression; `Filter` renders one
//! with proper quoting.

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    // Comparison operators
    Eq(String, FilterValue),
    Ne(String, FilterValue),
    Gt(String, FilterValue),
    Ge(String, FilterValue),
    Lt(String, FilterValue),
    Le(String, FilterValue),

    // Pattern matching
    Contains(String, String),
    StartsWith(String, String),
    EndsWith(String, String),

    In(String, Vec<FilterValue>),
    IsNull(String),
    IsNotNull(String),

    // Logical operators
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),

    // Passed through untouched
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Number(f64),
    Integer(i64),
    /// Rendered as 1/0; feature services store booleans as small integers
    Boolean(bool),
    Null,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Gt(field.into(), value.into())
    }

    pub fn ge(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Ge(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Lt(field.into(), value.into())
    }

    pub fn le(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Le(field.into(), value.into())
    }

    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Contains(field.into(), value.into())
    }

    pub fn starts_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::StartsWith(field.into(), value.into())
    }

    pub fn ends_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::EndsWith(field.into(), value.into())
    }

    pub fn is_in<V: Into<FilterValue>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull(field.into())
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::IsNotNull(field.into())
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Self::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Self::Or(filters)
    }

    pub fn not(filter: Filter) -> Self {
        Self::Not(Box::new(filter))
    }

    pub fn raw(filter: impl Into<String>) -> Self {
        Self::Raw(filter.into())
    }

    /// Render as a where-clause expression
    pub fn to_sql(&self) -> String {
        match self {
            Filter::Eq(field, FilterValue::Null) => format!("{} IS NULL", field),
            Filter::Ne(field, FilterValue::Null) => format!("{} IS NOT NULL", field),
            Filter::Eq(field, value) => format!("{} = {}", field, value.to_sql()),
            Filter::Ne(field, value) => format!("{} <> {}", field, value.to_sql()),
            Filter::Gt(field, value) => format!("{} > {}", field, value.to_sql()),
            Filter::Ge(field, value) => format!("{} >= {}", field, value.to_sql()),
            Filter::Lt(field, value) => format!("{} < {}", field, value.to_sql()),
            Filter::Le(field, value) => format!("{} <= {}", field, value.to_sql()),

            Filter::Contains(field, value) => format!("{} LIKE '%{}%'", field, escape(value)),
            Filter::StartsWith(field, value) => format!("{} LIKE '{}%'", field, escape(value)),
            Filter::EndsWith(field, value) => format!("{} LIKE '%{}'", field, escape(value)),

            Filter::In(field, values) => {
                let values: Vec<String> = values.iter().map(|v| v.to_sql()).collect();
                format!("{} IN ({})", field, values.join(", "))
            }
            Filter::IsNull(field) => format!("{} IS NULL", field),
            Filter::IsNotNull(field) => format!("{} IS NOT NULL", field),

            Filter::And(filters) => join(filters, " AND "),
            Filter::Or(filters) => join(filters, " OR "),
            Filter::Not(filter) => format!("NOT ({})", filter.to_sql()),

            Filter::Raw(raw) => raw.clone(),
        }
    }
}

fn join(filters: &[Filter], separator: &str) -> String {
    let parts: Vec<String> = filters.iter().map(|f| f.to_sql()).collect();
    format!("({})", parts.join(separator))
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

impl FilterValue {
    pub fn to_sql(&self) -> String {
        match self {
            FilterValue::String(s) => format!("'{}'", escape(s)),
            FilterValue::Number(n) => n.to_string(),
            FilterValue::Integer(i) => i.to_string(),
            FilterValue::Boolean(b) => if *b { "1" } else { "0" }.to_string(),
            FilterValue::Null => "NULL".to_string(),
        }
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::String(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::String(value.to_string())
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Number(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Integer(value as i64)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Boolean(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_filters() {
        assert_eq!(Filter::eq("STATUS", 1).to_sql(), "STATUS = 1");
        assert_eq!(Filter::ne("CITY", "Austin").to_sql(), "CITY <> 'Austin'");
        assert_eq!(Filter::ge("POP2020", 50000.5).to_sql(), "POP2020 >= 50000.5");
    }

    #[test]
    fn test_null_comparisons() {
        assert_eq!(Filter::eq("OWNER", FilterValue::Null).to_sql(), "OWNER IS NULL");
        assert_eq!(Filter::is_not_null("OWNER").to_sql(), "OWNER IS NOT NULL");
    }

    #[test]
    fn test_pattern_matching() {
        assert_eq!(Filter::contains("NAME", "Park").to_sql(), "NAME LIKE '%Park%'");
        assert_eq!(Filter::starts_with("NAME", "St").to_sql(), "NAME LIKE 'St%'");
    }

    #[test]
    fn test_in_list() {
        assert_eq!(Filter::is_in("ZONE", ["R1", "R2"]).to_sql(), "ZONE IN ('R1', 'R2')");
    }

    #[test]
    fn test_nested_filters() {
        let filter = Filter::and(vec![
            Filter::eq("ACTIVE", true),
            Filter::or(vec![Filter::contains("NAME", "Lake"), Filter::gt("ACRES", 10)]),
        ]);
        assert_eq!(filter.to_sql(), "(ACTIVE = 1 AND (NAME LIKE '%Lake%' OR ACRES > 10))");
    }

    #[test]
    fn test_quote_escaping() {
        assert_eq!(Filter::eq("OWNER", "O'Connor").to_sql(), "OWNER = 'O''Connor'");
    }
}
