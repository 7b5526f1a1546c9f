use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use raahein_core::{Booking, CoreError, DriverProfile, Ride, RideRequest};

use crate::error::corrupt;

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
pub(crate) struct DriverRow {
    user_id: i64,
    verification_status: String,
    vehicle_seats: i32,
}

impl TryFrom<DriverRow> for DriverProfile {
    type Error = CoreError;

    fn try_from(row: DriverRow) -> Result<Self, Self::Error> {
        Ok(DriverProfile {
            user_id: row.user_id,
            verification_status: row
                .verification_status
                .parse()
                .map_err(|e| corrupt("driver", e))?,
            vehicle_seats: row.vehicle_seats,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RideRow {
    id: i64,
    driver_id: i64,
    origin: String,
    destination: String,
    departure_date: NaiveDate,
    departure_time: NaiveTime,
    available_seats: i32,
    total_seats: i32,
    fare: f64,
    status: String,
    is_suspicious: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RideRow> for Ride {
    type Error = CoreError;

    fn try_from(row: RideRow) -> Result<Self, Self::Error> {
        Ok(Ride {
            id: row.id,
            driver_id: row.driver_id,
            origin: row.origin,
            destination: row.destination,
            departure_date: row.departure_date,
            departure_time: row.departure_time,
            available_seats: row.available_seats,
            total_seats: row.total_seats,
            fare: row.fare,
            status: row.status.parse().map_err(|e| corrupt("ride", e))?,
            is_suspicious: row.is_suspicious,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BookingRow {
    id: i64,
    ride_id: i64,
    passenger_id: i64,
    seats_booked: i32,
    fare: f64,
    status: String,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            ride_id: row.ride_id,
            passenger_id: row.passenger_id,
            seats_booked: row.seats_booked,
            fare: row.fare,
            status: row.status.parse().map_err(|e| corrupt("booking", e))?,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RequestRow {
    id: i64,
    passenger_id: i64,
    origin: String,
    destination: String,
    earliest_date: NaiveDate,
    earliest_time: DateTime<Utc>,
    latest_time: DateTime<Utc>,
    seats_needed: i32,
    offer_per_seat: Option<f64>,
    status: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for RideRequest {
    type Error = CoreError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(RideRequest {
            id: row.id,
            passenger_id: row.passenger_id,
            origin: row.origin,
            destination: row.destination,
            earliest_date: row.earliest_date,
            earliest_time: row.earliest_time,
            latest_time: row.latest_time,
            seats_needed: row.seats_needed,
            offer_per_seat: row.offer_per_seat,
            status: row.status.parse().map_err(|e| corrupt("ride request", e))?,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

/// Convert a batch of rows, failing on the first corrupt one.
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, CoreError>
where
    T: TryFrom<R, Error = CoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}
