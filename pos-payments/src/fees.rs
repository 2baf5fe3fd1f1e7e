//! Fee computation. Rates are stored in basis points (1 bps = 0.01%) so they
//! can represent fractional-percent provider pricing without floats.

#[derive(Debug, Clone, Copy)]
pub struct FeeRates {
    pub provider_fee_bps: i32,
    pub platform_fee_bps: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBreakdown {
    pub provider_fee_cents: i64,
    pub platform_fee_cents: i64,
    pub total_fee_cents: i64,
}

/// The maximum allowed disagreement between what the client displayed to
/// the customer and what the server independently computes.
pub const MAX_FEE_DISAGREEMENT_CENTS: i64 = 1;

pub fn compute_fees(amount_cents: i64, rates: FeeRates) -> FeeBreakdown {
    let provider_fee_cents = bps_of(amount_cents, rates.provider_fee_bps);
    let platform_fee_cents = bps_of(amount_cents, rates.platform_fee_bps);
    FeeBreakdown {
        provider_fee_cents,
        platform_fee_cents,
        total_fee_cents: provider_fee_cents + platform_fee_cents,
    }
}

/// Returns `Ok(())` if `client_displayed_fee_cents` is within tolerance of
/// the server-computed fee, `Err(server_fee_cents)` otherwise.
pub fn check_fee_agreement(
    client_displayed_fee_cents: i64,
    server_fee_cents: i64,
) -> Result<(), i64> {
    if (client_displayed_fee_cents - server_fee_cents).abs() <= MAX_FEE_DISAGREEMENT_CENTS {
        Ok(())
    } else {
        Err(server_fee_cents)
    }
}

fn bps_of(amount_cents: i64, bps: i32) -> i64 {
    // Rounds to the nearest cent rather than always truncating down, so
    // small amounts don't systematically under-charge the platform.
    ((amount_cents as i128 * bps as i128 + 5000) / 10_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_fees_in_basis_points() {
        let fees = compute_fees(
            10_000,
            FeeRates {
                provider_fee_bps: 150, // 1.5%
                platform_fee_bps: 50,  // 0.5%
            },
        );
        assert_eq!(fees.provider_fee_cents, 150);
        assert_eq!(fees.platform_fee_cents, 50);
        assert_eq!(fees.total_fee_cents, 200);
    }

    #[test]
    fn rounds_to_nearest_cent() {
        // 33 cents * 150 bps = 0.495 cents, rounds to 0 (banker's-free round-half-up)
        assert_eq!(bps_of(33, 150), 0);
        // 34 cents * 150 bps = 0.51 cents, rounds to 1
        assert_eq!(bps_of(34, 150), 1);
    }

    #[test]
    fn agreement_within_one_cent_passes() {
        assert!(check_fee_agreement(200, 201).is_ok());
        assert!(check_fee_agreement(200, 199).is_ok());
        assert_eq!(check_fee_agreement(200, 205), Err(205));
    }
}
