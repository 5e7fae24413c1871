//! Parameter bounds checking shared by the filter builders

use crate::common::{FilterError, Result};

/// Cuckoo sizing degenerates below this false-positive target.
pub const MIN_CUCKOO_FPP: f64 = 8.673617379884035e-19; // 2^-60

/// Validate that capacity is positive
pub fn validate_capacity(capacity: u64) -> Result<()> {
    if capacity == 0 {
        return Err(FilterError::invalid_parameter(
            "expected_items",
            capacity,
            "must be greater than 0",
        ));
    }
    Ok(())
}

/// Validate that a value is a valid probability (0.0 < p < 1.0)
pub fn validate_probability(value: f64, param_name: &str) -> Result<()> {
    if !(0.0 < value && value < 1.0) {
        return Err(FilterError::invalid_parameter(
            param_name,
            value,
            "must be in range (0.0, 1.0) (exclusive)",
        ));
    }
    Ok(())
}

/// Validate the counter width of a stable filter bucket
pub fn validate_bits_per_bucket(bits: u32) -> Result<()> {
    if bits == 0 || bits >= 64 {
        return Err(FilterError::invalid_parameter(
            "bits_per_bucket",
            bits,
            "must be in range [1, 63]",
        ));
    }
    Ok(())
}

/// Validate a bucket-set tag width
pub fn validate_bits_per_tag(bits: u32) -> Result<()> {
    if bits == 0 || bits > 63 {
        return Err(FilterError::invalid_parameter(
            "bits_per_tag",
            bits,
            "must be in range [1, 63]",
        ));
    }
    Ok(())
}

/// Validate a cuckoo false-positive target against its sizing floor
pub fn validate_cuckoo_fpp(fpp: f64) -> Result<()> {
    validate_probability(fpp, "fpp")?;
    if fpp < MIN_CUCKOO_FPP {
        return Err(FilterError::invalid_parameter(
            "fpp",
            fpp,
            "must be at least 2^-60 for cuckoo filters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_capacity() {
        assert!(validate_capacity(1).is_ok());
        assert!(validate_capacity(1_000_000).is_ok());
        assert!(validate_capacity(0).is_err());
    }

    #[test]
    fn test_validate_probability() {
        assert!(validate_probability(0.01, "fpp").is_ok());
        assert!(validate_probability(0.99, "fpp").is_ok());
        assert!(validate_probability(0.0, "fpp").is_err());
        assert!(validate_probability(1.0, "fpp").is_err());
        assert!(validate_probability(-0.1, "fpp").is_err());
    }

    #[test]
    fn test_validate_bits_per_bucket() {
        assert!(validate_bits_per_bucket(1).is_ok());
        assert!(validate_bits_per_bucket(8).is_ok());
        assert!(validate_bits_per_bucket(63).is_ok());
        assert!(validate_bits_per_bucket(0).is_err());
        assert!(validate_bits_per_bucket(64).is_err());
    }

    #[test]
    fn test_validate_cuckoo_fpp() {
        assert!(validate_cuckoo_fpp(0.01).is_ok());
        assert!(validate_cuckoo_fpp(1e-18).is_ok());
        assert!(validate_cuckoo_fpp(1e-20).is_err());
        assert!(validate_cuckoo_fpp(0.0).is_err());
    }
}
