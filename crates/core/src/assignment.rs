//! Delivery-partner ranking for auto-assignment.

use crate::types::{Coordinates, UserId};

/// An available partner with a last known position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub partner_id: UserId,
    pub location: Coordinates,
}

/// A candidate with its distance from the pickup point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedCandidate {
    pub partner_id: UserId,
    pub distance_km: f64,
}

/// Rank `candidates` by distance from `origin`.
///
/// Partners further than `radius_km` or listed in `excluded` are dropped.
/// Ties are broken by partner id so the result is deterministic.
#[must_use]
pub fn rank_partners(
    origin: &Coordinates,
    candidates: &[Candidate],
    radius_km: f64,
    excluded: &[UserId],
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .iter()
        .filter(|c| !excluded.contains(&c.partner_id))
        .map(|c| RankedCandidate {
            partner_id: c.partner_id,
            distance_km: origin.distance_km(&c.location),
        })
        .filter(|r| r.distance_km <= radius_km)
        .collect();

    ranked.sort_by(|a, b| {
        a.distance_km
            .total_cmp(&b.distance_km)
            .then_with(|| a.partner_id.cmp(&b.partner_id))
    });
    ranked
}

/// The closest eligible partner, if any.
#[must_use]
pub fn nearest(
    origin: &Coordinates,
    candidates: &[Candidate],
    radius_km: f64,
    excluded: &[UserId],
) -> Option<RankedCandidate> {
    rank_partners(origin, candidates, radius_km, excluded)
        .into_iter()
        .next()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng).unwrap()
    }

    fn candidate(id: i64, lat: f64, lng: f64) -> Candidate {
        Candidate {
            partner_id: UserId::new(id),
            location: at(lat, lng),
        }
    }

    #[test]
    fn test_orders_by_distance() {
        let store = at(12.9716, 77.5946);
        let candidates = [
            candidate(1, 13.0500, 77.5946),
            candidate(2, 12.9720, 77.5950),
            candidate(3, 12.9900, 77.5946),
        ];
        let ranked = rank_partners(&store, &candidates, 50.0, &[]);
        let ids: Vec<i64> = ranked.iter().map(|r| r.partner_id.as_i64()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_radius_and_exclusions() {
        let store = at(12.9716, 77.5946);
        let candidates = [
            candidate(1, 12.9720, 77.5950),
            candidate(2, 12.9800, 77.5946),
            candidate(3, 13.5000, 77.5946),
        ];
        let pick = nearest(&store, &candidates, 10.0, &[UserId::new(1)]).unwrap();
        assert_eq!(pick.partner_id, UserId::new(2));

        assert!(nearest(&store, &candidates, 10.0, &[UserId::new(1), UserId::new(2)]).is_none());
    }

    #[test]
    fn test_ties_break_on_id() {
        let store = at(0.0, 0.0);
        let candidates = [candidate(9, 0.01, 0.0), candidate(4, 0.01, 0.0)];
        let pick = nearest(&store, &candidates, 5.0, &[]).unwrap();
        assert_eq!(pick.partner_id, UserId::new(4));
    }
}
