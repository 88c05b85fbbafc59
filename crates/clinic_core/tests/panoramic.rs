mod common;

use clinic_core::repo::{ArrivalRepository, BoxRepository};
use clinic_core::{AdminService, AssignBoxRequest, AssignmentService, PanoramicService};
use common::{
    admin, arrived_patient, dentist, front_desk, migrated_conn, seed_box, seed_professional,
    store, DENTIST_PRINCIPAL,
};

#[test]
fn board_shows_occupants_and_waiting_queue() {
    let conn = migrated_conn();
    let store = store(&conn);
    let professional = seed_professional(&store, DENTIST_PRINCIPAL);
    let first_box = seed_box(&store, 1);
    let second_box = seed_box(&store, 2);
    let seated = arrived_patient(&store, "11111111-1");
    let waiting = arrived_patient(&store, "22222222-2");

    let assignment = AssignmentService::new(store)
        .assign_box(
            &dentist(),
            AssignBoxRequest {
                box_id: second_box.id,
                patient_id: seated.id,
                estimated_minutes: 40,
            },
        )
        .unwrap();

    let view = PanoramicService::new(store).panoramic(&front_desk()).unwrap();

    assert_eq!(view.boxes.len(), 2);
    assert_eq!(view.boxes[0].box_id, first_box.id);
    assert!(!view.boxes[0].occupied);
    assert_eq!(view.boxes[0].patient_name, None);

    let occupied = &view.boxes[1];
    assert!(occupied.occupied);
    assert_eq!(occupied.patient_id, Some(seated.id));
    assert_eq!(occupied.professional_id, Some(professional.id));
    assert_eq!(
        occupied.professional_name.as_deref(),
        Some(professional.full_name.as_str())
    );
    assert_eq!(occupied.estimated_end, Some(assignment.estimated_end));

    assert_eq!(view.waiting.len(), 1);
    assert_eq!(view.waiting[0].patient_id, waiting.id);
}

#[test]
fn reset_frees_boxes_and_closes_arrivals() {
    let conn = migrated_conn();
    let store = store(&conn);
    seed_professional(&store, DENTIST_PRINCIPAL);
    let treatment_box = seed_box(&store, 1);
    let seated = arrived_patient(&store, "11111111-1");
    arrived_patient(&store, "22222222-2");
    AssignmentService::new(store)
        .assign_box(
            &dentist(),
            AssignBoxRequest {
                box_id: treatment_box.id,
                patient_id: seated.id,
                estimated_minutes: 40,
            },
        )
        .unwrap();

    let report = AdminService::new(store).reset_clinic_day(&admin()).unwrap();

    assert_eq!(report.boxes_cleared, 1);
    assert_eq!(report.arrivals_closed, 2);
    assert!(!store.get_box(treatment_box.id).unwrap().unwrap().is_occupied());
    assert!(store.list_open_arrivals(false).unwrap().is_empty());
}

#[test]
fn reset_is_reserved_for_administrators() {
    let conn = migrated_conn();
    let store = store(&conn);
    let service = AdminService::new(store);

    assert_eq!(
        service.reset_clinic_day(&dentist()).unwrap_err().status_code(),
        403
    );
    assert_eq!(
        service.reset_clinic_day(&front_desk()).unwrap_err().status_code(),
        403
    );
}
