//! Inline keyboards.
//!
//! Admin-only buttons are only rendered for admins; the guard still checks
//! every press since keyboards outlive role changes.

use unic_langid::LanguageIdentifier;

use super::cards::{format_date, short};
use super::transport::{Button, Keyboard};
use super::trigger::Trigger;
use crate::flows::AdminAction;
use crate::i18n;
use crate::storage::{MaintenanceRecord, RepairRecord, Vehicle, VehicleField};

/// Builds a callback button for a trigger.
pub fn cb(label: impl Into<String>, trigger: Trigger) -> Button {
    Button::callback(label, trigger.callback_data())
}

fn back_to_main_button(lang: &LanguageIdentifier) -> Button {
    cb(i18n::t(lang, "common.back_to_main"), Trigger::BackToMain)
}

fn back_to_vehicle_button(lang: &LanguageIdentifier, vehicle_id: i64) -> Button {
    cb(i18n::t(lang, "common.back_to_vehicle"), Trigger::ShowVehicle(vehicle_id))
}

/// Vehicle list plus, for admins, the management entries.
pub fn main_menu(lang: &LanguageIdentifier, vehicles: &[Vehicle], is_admin: bool) -> Keyboard {
    let mut keyboard = Keyboard::new();
    for vehicle in vehicles {
        keyboard = keyboard.button(cb(format!("🚛 {}", vehicle.title()), Trigger::ShowVehicle(vehicle.id)));
    }
    if is_admin {
        keyboard = keyboard
            .button(cb(i18n::t(lang, "menu.add_vehicle"), Trigger::AddVehicle))
            .button(cb(i18n::t(lang, "menu.admin_panel"), Trigger::AdminMenu));
    }
    keyboard
}

pub fn vehicle_menu(lang: &LanguageIdentifier, vehicle_id: i64, is_admin: bool) -> Keyboard {
    let mut keyboard = Keyboard::new()
        .row(vec![
            cb(
                i18n::t(lang, "vehicle.maintenance_button"),
                Trigger::ShowMaintenance { vehicle_id, page: 0 },
            ),
            cb(i18n::t(lang, "vehicle.repairs_button"), Trigger::ManageRepairs(vehicle_id)),
        ])
        .button(cb(i18n::t(lang, "vehicle.fuel_button"), Trigger::ShowFuelStats(vehicle_id)));

    if is_admin {
        keyboard = keyboard
            .row(vec![
                cb(i18n::t(lang, "vehicle.mileage_button"), Trigger::UpdateMileage(vehicle_id)),
                cb(i18n::t(lang, "vehicle.refueling_button"), Trigger::AddRefueling(vehicle_id)),
            ])
            .row(vec![
                cb(
                    i18n::t(lang, "vehicle.add_maintenance_button"),
                    Trigger::AddMaintenance(vehicle_id),
                ),
                cb(i18n::t(lang, "vehicle.add_repair_button"), Trigger::AddRepair(vehicle_id)),
            ])
            .button(cb(i18n::t(lang, "vehicle.edit_button"), Trigger::EditVehicle(vehicle_id)));
    }
    keyboard.button(back_to_main_button(lang))
}

/// Shown under every flow prompt.
pub fn cancel(lang: &LanguageIdentifier, can_skip: bool) -> Keyboard {
    let mut keyboard = Keyboard::new();
    if can_skip {
        keyboard = keyboard.button(cb(i18n::t(lang, "common.skip"), Trigger::SkipStep));
    }
    keyboard.button(cb(i18n::t(lang, "common.cancel"), Trigger::Cancel))
}

pub fn back_to_main(lang: &LanguageIdentifier) -> Keyboard {
    Keyboard::new().button(back_to_main_button(lang))
}

pub fn back_to_vehicle(lang: &LanguageIdentifier, vehicle_id: i64) -> Keyboard {
    Keyboard::new()
        .button(back_to_vehicle_button(lang, vehicle_id))
        .button(back_to_main_button(lang))
}

pub fn mileage_confirm(lang: &LanguageIdentifier, vehicle_id: i64, mileage: i64) -> Keyboard {
    Keyboard::new()
        .button(cb(
            i18n::t_with(lang, "mileage.confirm_button", &[("mileage", mileage.to_string())]),
            Trigger::ConfirmMileage { vehicle_id, mileage },
        ))
        .button(cb(i18n::t(lang, "common.cancel"), Trigger::Cancel))
}

pub fn repair_list(lang: &LanguageIdentifier, vehicle_id: i64, repairs: &[RepairRecord], is_admin: bool) -> Keyboard {
    let mut keyboard = Keyboard::new();
    for repair in repairs {
        let label = format!("🔧 {} · {}", format_date(repair.date), short(&repair.description, 24));
        keyboard = keyboard.button(cb(label, Trigger::ShowRepair(repair.id)));
    }
    if is_admin {
        keyboard = keyboard.button(cb(i18n::t(lang, "vehicle.add_repair_button"), Trigger::AddRepair(vehicle_id)));
    }
    keyboard.button(back_to_vehicle_button(lang, vehicle_id))
}

pub fn repair_detail(lang: &LanguageIdentifier, repair: &RepairRecord, is_admin: bool) -> Keyboard {
    let mut keyboard = Keyboard::new();
    if is_admin {
        keyboard = keyboard.row(vec![
            cb(i18n::t(lang, "repair.edit_button"), Trigger::EditRepair(repair.id)),
            cb(i18n::t(lang, "repair.delete_button"), Trigger::DeleteRepair(repair.id)),
        ]);
    }
    keyboard
        .button(cb(
            i18n::t(lang, "repair.back_to_list"),
            Trigger::ManageRepairs(repair.vehicle_id),
        ))
        .button(back_to_vehicle_button(lang, repair.vehicle_id))
}

/// Second step of the two-step deletion.
pub fn delete_confirm(lang: &LanguageIdentifier, repair: &RepairRecord) -> Keyboard {
    Keyboard::new().row(vec![
        cb(
            i18n::t(lang, "repair.delete_yes"),
            Trigger::ConfirmDeleteRepair(repair.id),
        ),
        cb(i18n::t(lang, "repair.delete_no"), Trigger::ShowRepair(repair.id)),
    ])
}

/// Pager for the maintenance history; `page` is zero-based.
pub fn maintenance_history(
    lang: &LanguageIdentifier,
    vehicle_id: i64,
    records: &[MaintenanceRecord],
    page: usize,
    total_pages: usize,
    is_admin: bool,
) -> Keyboard {
    let mut keyboard = Keyboard::new();
    if is_admin {
        for record in records {
            let label = i18n::t_with(
                lang,
                "maintenance.edit_button",
                &[("date", format_date(record.date))],
            );
            keyboard = keyboard.button(cb(label, Trigger::EditMaintenance(record.id)));
        }
    }

    if total_pages > 1 {
        let mut pager = Vec::new();
        if page > 0 {
            pager.push(cb(
                "⬅️",
                Trigger::ShowMaintenance {
                    vehicle_id,
                    page: page - 1,
                },
            ));
        }
        pager.push(cb(format!("{}/{}", page + 1, total_pages), Trigger::Noop));
        if page + 1 < total_pages {
            pager.push(cb(
                "➡️",
                Trigger::ShowMaintenance {
                    vehicle_id,
                    page: page + 1,
                },
            ));
        }
        keyboard = keyboard.row(pager);
    }

    if is_admin {
        keyboard = keyboard.button(cb(
            i18n::t(lang, "vehicle.add_maintenance_button"),
            Trigger::AddMaintenance(vehicle_id),
        ));
    }
    keyboard.button(back_to_vehicle_button(lang, vehicle_id))
}

pub fn fuel(lang: &LanguageIdentifier, vehicle_id: i64, is_admin: bool) -> Keyboard {
    let mut keyboard = Keyboard::new();
    if is_admin {
        keyboard = keyboard.row(vec![
            cb(i18n::t(lang, "vehicle.refueling_button"), Trigger::AddRefueling(vehicle_id)),
            cb(i18n::t(lang, "fuel.edit_button"), Trigger::EditFuel(vehicle_id)),
        ]);
    }
    keyboard.button(back_to_vehicle_button(lang, vehicle_id))
}

/// Editable columns, two per row.
pub fn field_picklist(lang: &LanguageIdentifier, vehicle_id: i64) -> Keyboard {
    let buttons: Vec<Button> = VehicleField::all()
        .map(|field| {
            cb(
                i18n::t(lang, &format!("field.{}", field.key())),
                Trigger::EditField { vehicle_id, field },
            )
        })
        .collect();

    let mut keyboard = Keyboard::new();
    for pair in buttons.chunks(2) {
        keyboard = keyboard.row(pair.to_vec());
    }
    keyboard
        .button(cb(i18n::t(lang, "fuel.edit_button"), Trigger::EditFuel(vehicle_id)))
        .button(back_to_vehicle_button(lang, vehicle_id))
}

pub fn admin_menu(lang: &LanguageIdentifier) -> Keyboard {
    Keyboard::new()
        .row(vec![
            cb(i18n::t(lang, "admin.add_button"), Trigger::AdminAdd),
            cb(i18n::t(lang, "admin.remove_button"), Trigger::AdminRemove),
        ])
        .button(back_to_main_button(lang))
}

pub fn admin_confirm(lang: &LanguageIdentifier, action: AdminAction, user_id: i64) -> Keyboard {
    Keyboard::new()
        .button(cb(
            i18n::t(lang, "common.confirm"),
            Trigger::AdminConfirm { action, user_id },
        ))
        .button(cb(i18n::t(lang, "common.cancel"), Trigger::Cancel))
}

pub fn admin_back(lang: &LanguageIdentifier) -> Keyboard {
    Keyboard::new()
        .button(cb(i18n::t(lang, "admin.back_button"), Trigger::AdminMenu))
        .button(back_to_main_button(lang))
}

pub fn help(lang: &LanguageIdentifier, help_url: Option<&str>) -> Keyboard {
    let mut keyboard = Keyboard::new();
    if let Some(url) = help_url {
        keyboard = keyboard.button(Button::url(i18n::t(lang, "help.docs_button"), url));
    }
    keyboard.button(back_to_main_button(lang))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn en() -> LanguageIdentifier {
        i18n::lang_from_code("en")
    }

    fn repair(id: i64) -> RepairRecord {
        RepairRecord {
            id,
            vehicle_id: 7,
            date: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            mileage: 45_000,
            description: "Brake pads".into(),
            cost: Some(1500.0),
        }
    }

    fn routes(keyboard: &Keyboard) -> Vec<Trigger> {
        keyboard.callbacks().map(Trigger::parse_callback).collect()
    }

    #[test]
    fn test_vehicle_menu_hides_admin_buttons() {
        let viewer = routes(&vehicle_menu(&en(), 7, false));
        assert!(viewer.iter().all(|t| !t.requires_admin()));
        assert!(viewer.contains(&Trigger::ManageRepairs(7)));

        let admin = routes(&vehicle_menu(&en(), 7, true));
        assert!(admin.contains(&Trigger::AddRepair(7)));
        assert!(admin.contains(&Trigger::UpdateMileage(7)));
        assert!(admin.contains(&Trigger::EditVehicle(7)));
    }

    #[test]
    fn test_cancel_keyboard_offers_skip_only_when_allowed() {
        assert_eq!(routes(&cancel(&en(), false)), vec![Trigger::Cancel]);
        assert_eq!(routes(&cancel(&en(), true)), vec![Trigger::SkipStep, Trigger::Cancel]);
    }

    #[test]
    fn test_history_pager() {
        let first = routes(&maintenance_history(&en(), 3, &[], 0, 3, false));
        assert_eq!(
            first,
            vec![
                Trigger::Noop,
                Trigger::ShowMaintenance { vehicle_id: 3, page: 1 },
                Trigger::ShowVehicle(3),
            ]
        );

        let last = routes(&maintenance_history(&en(), 3, &[], 2, 3, false));
        assert_eq!(last[0], Trigger::ShowMaintenance { vehicle_id: 3, page: 1 });
        assert_eq!(last[1], Trigger::Noop);
    }

    #[test]
    fn test_picklist_lists_every_field_in_order() {
        let fields: Vec<VehicleField> = routes(&field_picklist(&en(), 5))
            .into_iter()
            .filter_map(|t| match t {
                Trigger::EditField { field, .. } => Some(field),
                _ => None,
            })
            .collect();
        assert_eq!(fields, VehicleField::all().collect::<Vec<_>>());
    }

    #[test]
    fn test_delete_confirm_round_trip() {
        let triggers = routes(&delete_confirm(&en(), &repair(12)));
        assert_eq!(triggers, vec![Trigger::ConfirmDeleteRepair(12), Trigger::ShowRepair(12)]);
    }

    #[test]
    fn test_help_url_button() {
        let keyboard = help(&en(), Some("https://example.com/fleet"));
        assert_eq!(keyboard.rows.len(), 2);
        assert_eq!(routes(&keyboard), vec![Trigger::BackToMain]);
    }
}
