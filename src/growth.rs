//! Forecast/growth kernel: linear and compound growth projections with
//! validated parameters, overflow pre-detection, and structured warnings.
//!
//! Pure functions only — no I/O, no logging on the hot path. Warnings are
//! returned as data so callers decide independently whether a warning is
//! worth acting on.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthType {
    None,
    Unspecified,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthParams {
    pub growth_type: GrowthType,
    pub growth_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GrowthError {
    #[error("growth rate is required for growth type {0:?}")]
    MissingGrowthRate(GrowthType),
    #[error("growth rate must be >= -1.0")]
    InvalidGrowthRate,
    #[error("projection would overflow")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningCode {
    OverflowRisk,
    HighGrowthRate,
    LongProjection,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthWarning {
    pub code: WarningCode,
    pub message: &'static str,
    pub rate: f64,
    pub periods: u32,
}

/// `base * (1 + rate*n)`.
pub fn apply_linear_growth(base: f64, rate: f64, n: u32) -> f64 {
    base * (1.0 + rate * n as f64)
}

/// `base * (1+rate)^n`.
pub fn apply_exponential_growth(base: f64, rate: f64, n: u32) -> f64 {
    base * (1.0 + rate).powi(n as i32)
}

/// `UNSPECIFIED -> NONE`, else identity.
pub fn resolve_growth_type(t: GrowthType) -> GrowthType {
    match t {
        GrowthType::Unspecified => GrowthType::None,
        other => other,
    }
}

/// Dispatches on (resolved) `growth_type`; `NONE` returns `base`; a nil rate
/// is treated as `0.0`.
pub fn apply_growth(base: f64, growth_type: GrowthType, rate: Option<f64>, n: u32) -> f64 {
    let rate = rate.unwrap_or(0.0);
    match resolve_growth_type(growth_type) {
        GrowthType::None | GrowthType::Unspecified => base,
        GrowthType::Linear => apply_linear_growth(base, rate, n),
        GrowthType::Exponential => apply_exponential_growth(base, rate, n),
    }
}

/// Request-level params override resource-level params when the request
/// value is not the zero override (`type != UNSPECIFIED`, `rate != None`).
/// The final type is normalized via [`resolve_growth_type`].
pub fn resolve_growth_params(
    request_type: GrowthType,
    request_rate: Option<f64>,
    resource_type: GrowthType,
    resource_rate: Option<f64>,
) -> GrowthParams {
    let growth_type =
        if request_type != GrowthType::Unspecified { request_type } else { resource_type };
    let growth_rate = if request_rate.is_some() { request_rate } else { resource_rate };
    GrowthParams { growth_type: resolve_growth_type(growth_type), growth_rate }
}

/// Fails with [`GrowthError::MissingGrowthRate`] if `growth_type` is
/// `LINEAR`/`EXPONENTIAL` and `growth_rate` is nil; with
/// [`GrowthError::InvalidGrowthRate`] if the rate is `< -1.0`.
pub fn validate_growth_params(params: &GrowthParams) -> Result<(), GrowthError> {
    match params.growth_type {
        GrowthType::Linear | GrowthType::Exponential => match params.growth_rate {
            None => Err(GrowthError::MissingGrowthRate(params.growth_type)),
            Some(rate) if rate < -1.0 => Err(GrowthError::InvalidGrowthRate),
            Some(_) => Ok(()),
        },
        GrowthType::None | GrowthType::Unspecified => Ok(()),
    }
}

/// True when the projection would exceed `f64::MAX`. Non-positive base,
/// non-positive periods, nil/non-positive rate, and `NONE`/`UNSPECIFIED` all
/// short-circuit false.
pub fn check_overflow_risk(base: f64, growth_type: GrowthType, rate: Option<f64>, n: u32) -> bool {
    if base <= 0.0 || n == 0 {
        return false;
    }
    let Some(rate) = rate else { return false };
    if rate <= 0.0 {
        return false;
    }
    match resolve_growth_type(growth_type) {
        GrowthType::Exponential => {
            let bound = (f64::MAX / base).ln() / (1.0 + rate).ln();
            !bound.is_finite() || n as f64 > bound
        }
        GrowthType::Linear => {
            let projected_delta = base * rate * n as f64;
            !projected_delta.is_finite() || projected_delta > f64::MAX - base
        }
        GrowthType::None | GrowthType::Unspecified => false,
    }
}

/// Emits `OVERFLOW_RISK` (only when `is_cost` and overflow risk holds),
/// `HIGH_GROWTH_RATE` (`rate > 1.0`), `LONG_PROJECTION` (`EXPONENTIAL` and
/// `n > 36`), in that stable order.
pub fn check_growth_warnings_with_cost(
    base: f64,
    growth_type: GrowthType,
    rate: Option<f64>,
    n: u32,
    is_cost: bool,
) -> Vec<GrowthWarning> {
    let mut warnings = Vec::new();
    let r = rate.unwrap_or(0.0);

    if is_cost && check_overflow_risk(base, growth_type, rate, n) {
        warnings.push(GrowthWarning {
            code: WarningCode::OverflowRisk,
            message: "projected value may overflow; clamp or re-derive inputs",
            rate: r,
            periods: n,
        });
    }
    if r > 1.0 {
        warnings.push(GrowthWarning {
            code: WarningCode::HighGrowthRate,
            message: "growth rate exceeds 100% per period",
            rate: r,
            periods: n,
        });
    }
    if resolve_growth_type(growth_type) == GrowthType::Exponential && n > 36 {
        warnings.push(GrowthWarning {
            code: WarningCode::LongProjection,
            message: "exponential projection spans more than 36 periods",
            rate: r,
            periods: n,
        });
    }
    warnings
}

/// [`check_growth_warnings_with_cost`] with `is_cost = true`.
pub fn check_growth_warnings(base: f64, growth_type: GrowthType, rate: Option<f64>, n: u32) -> Vec<GrowthWarning> {
    check_growth_warnings_with_cost(base, growth_type, rate, n, true)
}

/// Validate -> collect warnings -> short-circuit on overflow risk -> compute.
/// Any resulting `±Inf`/`NaN` also yields [`GrowthError::Overflow`].
pub fn project_cost_safely(
    base: f64,
    params: &GrowthParams,
    n: u32,
) -> Result<(f64, Vec<GrowthWarning>), GrowthError> {
    validate_growth_params(params)?;
    let warnings = check_growth_warnings_with_cost(base, params.growth_type, params.growth_rate, n, true);

    if check_overflow_risk(base, params.growth_type, params.growth_rate, n) {
        return Err(GrowthError::Overflow);
    }

    let value = apply_growth(base, params.growth_type, params.growth_rate, n);
    if !value.is_finite() {
        return Err(GrowthError::Overflow);
    }
    Ok((value, warnings))
}
