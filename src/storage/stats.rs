//! Derived figures shown on the vehicle and fuel cards.

use super::{RefuelingRecord, Vehicle};

/// Remaining distance below which the next service is "approaching".
pub const SERVICE_SOON_KM: i64 = 1000;
/// Remaining distance below which the next service is urgent.
pub const SERVICE_CRITICAL_KM: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelStats {
    /// l/100km measured over the refueling history, or the vehicle's nominal value.
    pub avg_consumption: Option<f64>,
    pub avg_cost_per_liter: f64,
    pub total_liters: f64,
    pub total_cost: f64,
}

impl FuelStats {
    /// Computes statistics from refuelings in any order.
    ///
    /// Measured consumption needs at least two refuelings over a positive
    /// distance. The first fill-up is excluded from the fuel total since it
    /// covers distance driven before the history starts.
    pub fn compute(history: &[RefuelingRecord], nominal_consumption: Option<f64>) -> Self {
        let mut by_mileage: Vec<&RefuelingRecord> = history.iter().collect();
        by_mileage.sort_by_key(|r| r.mileage);

        let total_liters: f64 = by_mileage.iter().map(|r| r.liters).sum();
        let total_cost: f64 = by_mileage.iter().map(|r| r.total_cost()).sum();
        let avg_cost_per_liter = if by_mileage.is_empty() {
            0.0
        } else {
            by_mileage.iter().map(|r| r.cost_per_liter).sum::<f64>() / by_mileage.len() as f64
        };

        let measured = match (by_mileage.first(), by_mileage.last()) {
            (Some(first), Some(last)) if by_mileage.len() >= 2 && last.mileage > first.mileage => {
                let distance = (last.mileage - first.mileage) as f64;
                let fuel: f64 = by_mileage[1..].iter().map(|r| r.liters).sum();
                Some(fuel / distance * 100.0)
            }
            _ => None,
        };

        Self {
            avg_consumption: measured.or(nominal_consumption).map(round2),
            avg_cost_per_liter: round2(avg_cost_per_liter),
            total_liters: round2(total_liters),
            total_cost: round2(total_cost),
        }
    }
}

/// Upcoming service status derived from `next_to` and the current mileage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceAlert {
    Overdue,
    Critical { remaining_km: i64 },
    Soon { remaining_km: i64 },
}

impl MaintenanceAlert {
    pub fn for_vehicle(vehicle: &Vehicle) -> Option<Self> {
        let remaining_km = vehicle.next_to? - vehicle.mileage;
        match remaining_km {
            r if r <= 0 => Some(Self::Overdue),
            r if r <= SERVICE_CRITICAL_KM => Some(Self::Critical { remaining_km: r }),
            r if r <= SERVICE_SOON_KM => Some(Self::Soon { remaining_km: r }),
            _ => None,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn refueling(mileage: i64, liters: f64, price: f64) -> RefuelingRecord {
        RefuelingRecord {
            id: mileage,
            vehicle_id: 1,
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            mileage,
            liters,
            cost_per_liter: price,
        }
    }

    fn vehicle(mileage: i64, next_to: Option<i64>) -> Vehicle {
        Vehicle {
            id: 1,
            model: "Volvo FH".into(),
            reg_number: "A123BC".into(),
            vin: None,
            year: None,
            mileage,
            tachograph_required: false,
            osago_valid: None,
            tech_inspection_valid: None,
            skzi_valid_date: None,
            next_to,
            next_to_date: None,
            last_to_date: None,
            fuel_type: None,
            fuel_tank_capacity: None,
            avg_fuel_consumption: None,
        }
    }

    #[test]
    fn test_consumption_excludes_first_fill_up() {
        // 1000 km driven on the 300 liters bought after the first fill-up
        let history = vec![
            refueling(11_000, 150.0, 60.0),
            refueling(10_000, 400.0, 50.0),
            refueling(10_500, 150.0, 55.0),
        ];
        let stats = FuelStats::compute(&history, None);
        assert_eq!(stats.avg_consumption, Some(30.0));
        assert_eq!(stats.total_liters, 700.0);
        assert_eq!(stats.avg_cost_per_liter, 55.0);
        assert_eq!(stats.total_cost, 150.0 * 60.0 + 400.0 * 50.0 + 150.0 * 55.0);
    }

    #[test]
    fn test_single_refueling_falls_back_to_nominal() {
        let stats = FuelStats::compute(&[refueling(10_000, 40.0, 52.5)], Some(28.5));
        assert_eq!(stats.avg_consumption, Some(28.5));
        assert_eq!(stats.total_cost, 2100.0);
    }

    #[test]
    fn test_empty_history() {
        let stats = FuelStats::compute(&[], None);
        assert_eq!(stats.avg_consumption, None);
        assert_eq!(stats.total_liters, 0.0);
        assert_eq!(stats.avg_cost_per_liter, 0.0);
    }

    #[test]
    fn test_maintenance_alert_thresholds() {
        assert_eq!(MaintenanceAlert::for_vehicle(&vehicle(50_000, None)), None);
        assert_eq!(MaintenanceAlert::for_vehicle(&vehicle(50_000, Some(60_000))), None);
        assert_eq!(
            MaintenanceAlert::for_vehicle(&vehicle(59_000, Some(60_000))),
            Some(MaintenanceAlert::Soon { remaining_km: 1000 })
        );
        assert_eq!(
            MaintenanceAlert::for_vehicle(&vehicle(59_600, Some(60_000))),
            Some(MaintenanceAlert::Critical { remaining_km: 400 })
        );
        assert_eq!(
            MaintenanceAlert::for_vehicle(&vehicle(60_000, Some(60_000))),
            Some(MaintenanceAlert::Overdue)
        );
    }
}
