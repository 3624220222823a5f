//! Live value sources.
//!
//! A leaf node in an [`ElementTree`](crate::container::ElementTree) can be
//! bound to a [`ValueSource`], after which value reads and writes go through
//! the source instead of the in-memory payload. Calls block until the source
//! returns.

use crate::error::ValueError;
use crate::model::scope::ValueScope;

/// Getter/setter pair backing an element's value.
pub trait ValueSource {
    fn read(&self) -> Result<ValueScope, ValueError>;

    fn write(&mut self, value: &ValueScope) -> Result<(), ValueError>;
}

/// A source holding its value in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryValue {
    value: ValueScope,
    writes: usize,
}

impl MemoryValue {
    pub fn new(value: ValueScope) -> Self {
        Self { value, writes: 0 }
    }

    pub fn value(&self) -> &ValueScope {
        &self.value
    }

    /// Number of successful writes.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ValueSource for MemoryValue {
    fn read(&self) -> Result<ValueScope, ValueError> {
        Ok(self.value.clone())
    }

    fn write(&mut self, value: &ValueScope) -> Result<(), ValueError> {
        self.value = value.clone();
        self.writes += 1;
        Ok(())
    }
}

/// Read-only source computed by a closure.
pub struct ComputedValue<F> {
    compute: F,
}

impl<F> ComputedValue<F>
where
    F: Fn() -> Result<ValueScope, ValueError>,
{
    pub fn new(compute: F) -> Self {
        Self { compute }
    }
}

impl<F> ValueSource for ComputedValue<F>
where
    F: Fn() -> Result<ValueScope, ValueError>,
{
    fn read(&self) -> Result<ValueScope, ValueError> {
        (self.compute)()
    }

    fn write(&mut self, _value: &ValueScope) -> Result<(), ValueError> {
        Err(ValueError::Source("value is read-only".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrimitiveValue;

    #[test]
    fn test_memory_value_counts_writes() {
        let mut src = MemoryValue::new(ValueScope::Property(None));
        src.write(&PrimitiveValue::Int(4).into()).unwrap();
        assert_eq!(src.writes(), 1);
        assert_eq!(src.read().unwrap(), PrimitiveValue::Int(4).into());
    }

    #[test]
    fn test_computed_value_is_read_only() {
        let mut src = ComputedValue::new(|| Ok(PrimitiveValue::Boolean(true).into()));
        assert_eq!(src.read().unwrap(), PrimitiveValue::Boolean(true).into());
        assert!(matches!(
            src.write(&ValueScope::Property(None)),
            Err(ValueError::Source(_))
        ));
    }
}
