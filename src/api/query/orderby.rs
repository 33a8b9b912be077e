//! `orderByFields` building

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    Asc(String),
    Desc(String),
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self::Asc(field.into())
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::Desc(field.into())
    }

    pub fn to_param(&self) -> String {
        match self {
            OrderBy::Asc(field) => format!("{} ASC", field),
            OrderBy::Desc(field) => format!("{} DESC", field),
        }
    }
}

/// Ordered list of sort keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderByClause {
    clauses: Vec<OrderBy>,
}

impl OrderByClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, order: OrderBy) -> Self {
        self.clauses.push(order);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn to_param(&self) -> Option<String> {
        if self.clauses.is_empty() {
            None
        } else {
            let parts: Vec<String> = self.clauses.iter().map(|o| o.to_param()).collect();
            Some(parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_orderby() {
        assert_eq!(OrderBy::asc("NAME").to_param(), "NAME ASC");
        assert_eq!(OrderBy::desc("POP2020").to_param(), "POP2020 DESC");
    }

    #[test]
    fn test_multiple_orderby() {
        let clause = OrderByClause::new()
            .add(OrderBy::asc("STATE"))
            .add(OrderBy::desc("POP2020"));

        assert_eq!(clause.to_param(), Some("STATE ASC, POP2020 DESC".to_string()));
    }

    #[test]
    fn test_empty_orderby() {
        assert_eq!(OrderByClause::new().to_param(), None);
    }
}
