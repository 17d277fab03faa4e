//! Message texts for menus, vehicle cards and histories.

use chrono::NaiveDate;
use unic_langid::LanguageIdentifier;

use crate::core::validation::DATE_FORMAT;
use crate::i18n;
use crate::storage::{
    FieldValue, FuelStats, MaintenanceAlert, MaintenanceRecord, RefuelingRecord, RepairRecord, Vehicle, VehicleField,
};

/// Refuelings listed under the fuel statistics.
const RECENT_REFUELINGS: usize = 5;

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Two decimals, trailing zeros dropped: `1500`, `52.5`, `52.37`.
pub fn format_amount(value: f64) -> String {
    let formatted = format!("{:.2}", value);
    formatted.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Truncates to `max` characters, appending an ellipsis.
pub fn short(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

/// Slices one page out of `items`; out-of-range pages clamp to the last one.
///
/// Returns the page, the clamped page index and the page count (at least 1).
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> (&[T], usize, usize) {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size).max(1);
    let page = page.min(total_pages - 1);
    let start = page * page_size;
    let end = (start + page_size).min(items.len());
    (&items[start..end], page, total_pages)
}

pub fn main_menu(lang: &LanguageIdentifier, vehicles: &[Vehicle]) -> String {
    if vehicles.is_empty() {
        i18n::t(lang, "menu.empty")
    } else {
        i18n::t_with(lang, "menu.title", &[("count", vehicles.len().to_string())])
    }
}

fn alert_line(lang: &LanguageIdentifier, alert: MaintenanceAlert) -> String {
    match alert {
        MaintenanceAlert::Overdue => i18n::t(lang, "alert.overdue"),
        MaintenanceAlert::Critical { remaining_km } => {
            i18n::t_with(lang, "alert.critical", &[("km", remaining_km.to_string())])
        }
        MaintenanceAlert::Soon { remaining_km } => i18n::t_with(lang, "alert.soon", &[("km", remaining_km.to_string())]),
    }
}

pub fn vehicle_card(lang: &LanguageIdentifier, vehicle: &Vehicle) -> String {
    let mut lines = Vec::new();
    if let Some(alert) = MaintenanceAlert::for_vehicle(vehicle) {
        lines.push(alert_line(lang, alert));
    }
    lines.push(format!("🚛 {}", vehicle.title()));

    let not_set = i18n::t(lang, "common.not_set");
    let line = |key: &str, value: String| i18n::t_with(lang, key, &[("value", value)]);

    lines.push(line("card.vin", vehicle.vin.clone().unwrap_or_else(|| not_set.clone())));
    if let Some(year) = vehicle.year {
        lines.push(line("card.year", year.to_string()));
    }
    lines.push(line("card.mileage", vehicle.mileage.to_string()));
    if let Some(date) = vehicle.last_to_date {
        lines.push(line("card.last_to", format_date(date)));
    }
    if let Some(next_to) = vehicle.next_to {
        let remaining = (next_to - vehicle.mileage).max(0);
        let date = vehicle.next_to_date.map(format_date).unwrap_or_else(|| not_set.clone());
        lines.push(i18n::t_with(
            lang,
            "card.next_to",
            &[
                ("date", date),
                ("mileage", next_to.to_string()),
                ("remaining", remaining.to_string()),
            ],
        ));
    }
    if let Some(date) = vehicle.osago_valid {
        lines.push(line("card.osago", format_date(date)));
    }
    if let Some(date) = vehicle.tech_inspection_valid {
        lines.push(line("card.tech_inspection", format_date(date)));
    }
    if vehicle.tachograph_required {
        let skzi = vehicle.skzi_valid_date.map(format_date).unwrap_or_else(|| not_set.clone());
        lines.push(line("card.skzi", skzi));
    }
    if let Some(fuel_type) = &vehicle.fuel_type {
        lines.push(line("card.fuel_type", fuel_type.clone()));
    }
    if let Some(capacity) = vehicle.fuel_tank_capacity {
        lines.push(line("card.tank_capacity", format_amount(capacity)));
    }
    if let Some(consumption) = vehicle.avg_fuel_consumption {
        lines.push(line("card.consumption", format_amount(consumption)));
    }

    lines.join("\n")
}

pub fn maintenance_history(
    lang: &LanguageIdentifier,
    vehicle: &Vehicle,
    records: &[MaintenanceRecord],
    page: usize,
    total_pages: usize,
) -> String {
    let mut text = i18n::t_with(lang, "maintenance.history_title", &[("vehicle", vehicle.title())]);
    if records.is_empty() {
        text.push_str("\n\n");
        text.push_str(&i18n::t(lang, "maintenance.history_empty"));
        return text;
    }

    for record in records {
        text.push_str(&format!(
            "\n\n📅 {} · {} km\n{}",
            format_date(record.date),
            record.mileage,
            record.works
        ));
    }
    if total_pages > 1 {
        text.push_str("\n\n");
        text.push_str(&i18n::t_with(
            lang,
            "common.page",
            &[("page", (page + 1).to_string()), ("total", total_pages.to_string())],
        ));
    }
    text
}

pub fn repair_list(lang: &LanguageIdentifier, vehicle: &Vehicle, repairs: &[RepairRecord]) -> String {
    let title = i18n::t_with(lang, "repair.list_title", &[("vehicle", vehicle.title())]);
    if repairs.is_empty() {
        return format!("{}\n\n{}", title, i18n::t(lang, "repair.list_empty"));
    }
    let total: f64 = repairs.iter().filter_map(|r| r.cost).sum();
    format!(
        "{}\n\n{}",
        title,
        i18n::t_with(
            lang,
            "repair.list_summary",
            &[("count", repairs.len().to_string()), ("total", format_amount(total))],
        )
    )
}

pub fn repair_detail(lang: &LanguageIdentifier, repair: &RepairRecord) -> String {
    let cost = repair
        .cost
        .map(format_amount)
        .unwrap_or_else(|| i18n::t(lang, "common.not_set"));
    i18n::t_with(
        lang,
        "repair.detail",
        &[
            ("date", format_date(repair.date)),
            ("mileage", repair.mileage.to_string()),
            ("description", repair.description.clone()),
            ("cost", cost),
        ],
    )
}

pub fn fuel_stats(lang: &LanguageIdentifier, vehicle: &Vehicle, history: &[RefuelingRecord]) -> String {
    let mut text = i18n::t_with(lang, "fuel.stats_title", &[("vehicle", vehicle.title())]);
    let not_set = i18n::t(lang, "common.not_set");

    text.push_str("\n\n");
    text.push_str(&i18n::t_with(
        lang,
        "fuel.info",
        &[
            ("type", vehicle.fuel_type.clone().unwrap_or_else(|| not_set.clone())),
            (
                "capacity",
                vehicle.fuel_tank_capacity.map(format_amount).unwrap_or_else(|| not_set.clone()),
            ),
            (
                "nominal",
                vehicle.avg_fuel_consumption.map(format_amount).unwrap_or_else(|| not_set.clone()),
            ),
        ],
    ));

    if history.is_empty() {
        text.push_str("\n\n");
        text.push_str(&i18n::t(lang, "fuel.no_refuelings"));
        return text;
    }

    let stats = FuelStats::compute(history, vehicle.avg_fuel_consumption);
    text.push_str("\n\n");
    text.push_str(&i18n::t_with(
        lang,
        "fuel.stats",
        &[
            (
                "consumption",
                stats.avg_consumption.map(format_amount).unwrap_or_else(|| not_set.clone()),
            ),
            ("price", format_amount(stats.avg_cost_per_liter)),
            ("liters", format_amount(stats.total_liters)),
            ("cost", format_amount(stats.total_cost)),
        ],
    ));

    text.push_str("\n\n");
    text.push_str(&i18n::t(lang, "fuel.recent"));
    for record in history.iter().take(RECENT_REFUELINGS) {
        text.push_str(&format!(
            "\n⛽ {} · {} km · {} L × {} = {}",
            format_date(record.date),
            record.mileage,
            format_amount(record.liters),
            format_amount(record.cost_per_liter),
            format_amount(record.total_cost())
        ));
    }
    text
}

/// Display form of a stored or collected value.
pub fn value_display(lang: &LanguageIdentifier, value: Option<&FieldValue>) -> String {
    match value {
        Some(FieldValue::Text(text)) => text.clone(),
        Some(FieldValue::Int(number)) => number.to_string(),
        Some(FieldValue::Float(number)) => format_amount(*number),
        Some(FieldValue::Date(date)) => format_date(*date),
        Some(FieldValue::Null) | None => i18n::t(lang, "common.not_set"),
    }
}

/// Current value of an editable vehicle column.
pub fn field_value(vehicle: &Vehicle, field: VehicleField) -> FieldValue {
    let text = |value: &Option<String>| value.clone().map_or(FieldValue::Null, FieldValue::Text);
    let int = |value: Option<i64>| value.map_or(FieldValue::Null, FieldValue::Int);
    let date = |value: Option<NaiveDate>| value.map_or(FieldValue::Null, FieldValue::Date);

    match field {
        VehicleField::Model => FieldValue::Text(vehicle.model.clone()),
        VehicleField::RegNumber => FieldValue::Text(vehicle.reg_number.clone()),
        VehicleField::Vin => text(&vehicle.vin),
        VehicleField::Year => int(vehicle.year),
        VehicleField::OsagoValid => date(vehicle.osago_valid),
        VehicleField::TechInspectionValid => date(vehicle.tech_inspection_valid),
        VehicleField::SkziValidDate => date(vehicle.skzi_valid_date),
        VehicleField::NextTo => int(vehicle.next_to),
        VehicleField::NextToDate => date(vehicle.next_to_date),
        VehicleField::LastToDate => date(vehicle.last_to_date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn en() -> LanguageIdentifier {
        i18n::lang_from_code("en")
    }

    fn vehicle() -> Vehicle {
        Vehicle {
            id: 3,
            model: "Volvo FH".into(),
            reg_number: "A123BC".into(),
            vin: None,
            year: Some(2019),
            mileage: 49_600,
            tachograph_required: false,
            osago_valid: NaiveDate::from_ymd_opt(2026, 2, 23),
            tech_inspection_valid: None,
            skzi_valid_date: None,
            next_to: Some(50_000),
            next_to_date: None,
            last_to_date: None,
            fuel_type: None,
            fuel_tank_capacity: None,
            avg_fuel_consumption: None,
        }
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1500.0), "1500");
        assert_eq!(format_amount(52.5), "52.5");
        assert_eq!(format_amount(52.371), "52.37");
    }

    #[test]
    fn test_short() {
        assert_eq!(short("Brake pads", 24), "Brake pads");
        assert_eq!(short("Замена тормозных колодок", 10), "Замена то…");
    }

    #[test]
    fn test_paginate_clamps() {
        let items: Vec<i32> = (1..=12).collect();
        assert_eq!(paginate(&items, 0, 5), (&items[0..5], 0, 3));
        assert_eq!(paginate(&items, 2, 5), (&items[10..12], 2, 3));
        assert_eq!(paginate(&items, 9, 5), (&items[10..12], 2, 3));

        let empty: Vec<i32> = Vec::new();
        assert_eq!(paginate(&empty, 0, 5), (&empty[..], 0, 1));
    }

    #[test]
    fn test_vehicle_card_shows_alert_first() {
        let card = vehicle_card(&en(), &vehicle());
        let first = card.lines().next().unwrap();
        assert!(first.contains("400"), "{}", first);
        assert!(card.contains("Volvo FH (A123BC)"));
        assert!(card.contains("23.02.2026"));
    }

    #[test]
    fn test_field_value_reads_columns() {
        let vehicle = vehicle();
        assert_eq!(field_value(&vehicle, VehicleField::Year), FieldValue::Int(2019));
        assert_eq!(field_value(&vehicle, VehicleField::Vin), FieldValue::Null);
        assert_eq!(value_display(&en(), Some(&FieldValue::Int(2019))), "2019");
    }
}
