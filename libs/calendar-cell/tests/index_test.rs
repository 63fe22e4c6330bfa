use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc, Weekday};
use uuid::Uuid;

use calendar_cell::CalendarIndex;
use scheduler_models::{Doctor, SchedulingError, TimeInterval, WorkingWindow};

// 2025-03-03 is a Monday.
fn mon(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, hour, minute, 0).unwrap()
}

fn span(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeInterval {
    TimeInterval::new(start, end).expect("valid test interval")
}

fn weekday_doctor(buffer_minutes: i64) -> Doctor {
    let days = [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri];
    Doctor {
        id: Uuid::new_v4(),
        full_name: "Asha Rao".to_string(),
        specialty: "cardiology".to_string(),
        working_hours: days
            .iter()
            .map(|&day_of_week| WorkingWindow {
                day_of_week,
                start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            })
            .collect(),
        buffer_minutes,
    }
}

async fn index_with(doctor: &Doctor) -> Arc<CalendarIndex> {
    let index = Arc::new(CalendarIndex::new());
    index.register_doctor(doctor.clone()).await;
    index
}

#[tokio::test]
async fn reserve_on_free_calendar_succeeds() {
    let doctor = weekday_doctor(0);
    let index = index_with(&doctor).await;

    let result = index
        .reserve(doctor.id, Uuid::new_v4(), span(mon(9, 0), mon(9, 30)), Duration::zero())
        .await;
    assert!(result.is_ok());

    let busy = index.busy_snapshot(doctor.id).await.unwrap();
    assert_eq!(busy.len(), 1);
}

#[tokio::test]
async fn overlapping_reserve_is_a_conflict() {
    let doctor = weekday_doctor(0);
    let index = index_with(&doctor).await;

    index
        .reserve(doctor.id, Uuid::new_v4(), span(mon(9, 0), mon(9, 30)), Duration::zero())
        .await
        .unwrap();
    let result = index
        .reserve(doctor.id, Uuid::new_v4(), span(mon(9, 15), mon(9, 45)), Duration::zero())
        .await;
    assert_matches!(result, Err(SchedulingError::Conflict));

    // The failed attempt must not leave partial state behind.
    assert_eq!(index.busy_snapshot(doctor.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn back_to_back_is_fine_without_buffer_but_not_with() {
    let doctor = weekday_doctor(0);
    let index = index_with(&doctor).await;

    index
        .reserve(doctor.id, Uuid::new_v4(), span(mon(9, 0), mon(9, 30)), Duration::zero())
        .await
        .unwrap();
    index
        .reserve(doctor.id, Uuid::new_v4(), span(mon(9, 30), mon(10, 0)), Duration::zero())
        .await
        .unwrap();

    // A 10 minute pad makes the next back-to-back slot collide.
    let result = index
        .reserve(doctor.id, Uuid::new_v4(), span(mon(10, 0), mon(10, 30)), Duration::minutes(10))
        .await;
    assert_matches!(result, Err(SchedulingError::Conflict));
}

#[tokio::test]
async fn reserve_outside_working_hours_is_invalid() {
    let doctor = weekday_doctor(0);
    let index = index_with(&doctor).await;

    let evening = index
        .reserve(doctor.id, Uuid::new_v4(), span(mon(18, 0), mon(18, 30)), Duration::zero())
        .await;
    assert_matches!(evening, Err(SchedulingError::InvalidWindow(_)));

    // 2025-03-02 is a Sunday.
    let sunday = Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap();
    let weekend = index
        .reserve(
            doctor.id,
            Uuid::new_v4(),
            span(sunday, sunday + Duration::minutes(30)),
            Duration::zero(),
        )
        .await;
    assert_matches!(weekend, Err(SchedulingError::InvalidWindow(_)));
}

#[tokio::test]
async fn unknown_doctor_is_reported() {
    let index = CalendarIndex::new();
    let ghost = Uuid::new_v4();
    let result = index
        .reserve(ghost, Uuid::new_v4(), span(mon(9, 0), mon(9, 30)), Duration::zero())
        .await;
    assert_matches!(result, Err(SchedulingError::UnknownDoctor(id)) if id == ghost);
}

#[tokio::test]
async fn release_returns_freed_interval() {
    let doctor = weekday_doctor(0);
    let index = index_with(&doctor).await;
    let appointment_id = Uuid::new_v4();
    let interval = span(mon(11, 0), mon(11, 30));

    index
        .reserve(doctor.id, appointment_id, interval, Duration::zero())
        .await
        .unwrap();
    let freed = index.release(doctor.id, appointment_id).await.unwrap();
    assert_eq!(freed, interval);
    assert!(index.busy_snapshot(doctor.id).await.unwrap().is_empty());

    let again = index.release(doctor.id, appointment_id).await;
    assert_matches!(again, Err(SchedulingError::NotFound(_)));
}

#[tokio::test]
async fn reserve_earliest_skips_taken_slots() {
    let doctor = weekday_doctor(0);
    let index = index_with(&doctor).await;

    index
        .reserve(doctor.id, Uuid::new_v4(), span(mon(9, 0), mon(9, 30)), Duration::zero())
        .await
        .unwrap();

    let window = span(mon(9, 0), mon(12, 0));
    let reserved = index
        .reserve_earliest(
            doctor.id,
            Uuid::new_v4(),
            window,
            Duration::minutes(30),
            Duration::zero(),
            Duration::minutes(30),
        )
        .await
        .unwrap();
    assert_eq!(reserved, span(mon(9, 30), mon(10, 0)));
}

#[tokio::test]
async fn reserve_earliest_with_full_window_conflicts() {
    let doctor = weekday_doctor(0);
    let index = index_with(&doctor).await;

    index
        .reserve(doctor.id, Uuid::new_v4(), span(mon(9, 0), mon(10, 0)), Duration::zero())
        .await
        .unwrap();

    let result = index
        .reserve_earliest(
            doctor.id,
            Uuid::new_v4(),
            span(mon(9, 0), mon(10, 0)),
            Duration::minutes(30),
            Duration::zero(),
            Duration::minutes(30),
        )
        .await;
    assert_matches!(result, Err(SchedulingError::Conflict));
}

#[tokio::test]
async fn query_availability_subtracts_busy_slots() {
    let doctor = weekday_doctor(0);
    let index = index_with(&doctor).await;

    index
        .reserve(doctor.id, Uuid::new_v4(), span(mon(10, 0), mon(11, 0)), Duration::zero())
        .await
        .unwrap();

    let free = index
        .query_availability(doctor.id, span(mon(9, 0), mon(12, 0)))
        .await
        .unwrap();
    assert_eq!(free, vec![span(mon(9, 0), mon(10, 0)), span(mon(11, 0), mon(12, 0))]);
}

#[tokio::test]
async fn query_availability_clips_to_working_hours() {
    let doctor = weekday_doctor(0);
    let index = index_with(&doctor).await;

    // Window starts before the working day does.
    let free = index
        .query_availability(doctor.id, span(mon(7, 0), mon(10, 0)))
        .await
        .unwrap();
    assert_eq!(free, vec![span(mon(9, 0), mon(10, 0))]);
}

#[tokio::test]
async fn updated_working_hours_apply_to_new_reservations() {
    let doctor = weekday_doctor(0);
    let index = index_with(&doctor).await;

    index
        .update_working_hours(
            doctor.id,
            vec![WorkingWindow {
                day_of_week: Weekday::Mon,
                start: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            }],
        )
        .await
        .unwrap();

    let morning = index
        .reserve(doctor.id, Uuid::new_v4(), span(mon(9, 0), mon(9, 30)), Duration::zero())
        .await;
    assert_matches!(morning, Err(SchedulingError::InvalidWindow(_)));

    let afternoon = index
        .reserve(doctor.id, Uuid::new_v4(), span(mon(13, 0), mon(13, 30)), Duration::zero())
        .await;
    assert!(afternoon.is_ok());
}
