//! Result type alias for dbanon

use super::errors::DbAnonError;

/// Result type alias for dbanon operations
///
/// # Examples
///
/// ```
/// use dbanon::domain::result::Result;
/// use dbanon::domain::errors::DbAnonError;
///
/// fn failing_function() -> Result<()> {
///     Err(DbAnonError::Configuration("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, DbAnonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }
}
