pub const SELECT_DRIVER: &str = r#"
SELECT user_id, verification_status, vehicle_seats FROM drivers WHERE user_id = $1;
"#;

pub const SELECT_RIDE: &str = r#"
SELECT id, driver_id, origin, destination, departure_date, departure_time,
       available_seats, total_seats, fare, status, is_suspicious, created_at, updated_at
FROM rides WHERE id = $1;
"#;

pub const LOCK_RIDE: &str = r#"
SELECT id, driver_id, origin, destination, departure_date, departure_time,
       available_seats, total_seats, fare, status, is_suspicious, created_at, updated_at
FROM rides WHERE id = $1 FOR UPDATE;
"#;

pub const SEARCH_RIDES: &str = r#"
SELECT id, driver_id, origin, destination, departure_date, departure_time,
       available_seats, total_seats, fare, status, is_suspicious, created_at, updated_at
FROM rides
WHERE status = 'SCHEDULED'
  AND origin ILIKE $1
  AND destination ILIKE $2
  AND departure_date = $3
  AND departure_date >= $4
  AND available_seats >= $5
ORDER BY departure_date, departure_time, id
LIMIT $6 OFFSET $7;
"#;

pub const COUNT_SEARCH_RIDES: &str = r#"
SELECT COUNT(*) FROM rides
WHERE status = 'SCHEDULED'
  AND origin ILIKE $1
  AND destination ILIKE $2
  AND departure_date = $3
  AND departure_date >= $4
  AND available_seats >= $5;
"#;

pub const UPCOMING_RIDES: &str = r#"
SELECT id, driver_id, origin, destination, departure_date, departure_time,
       available_seats, total_seats, fare, status, is_suspicious, created_at, updated_at
FROM rides
WHERE status = 'SCHEDULED'
  AND departure_date >= $1
  AND ($2::text IS NULL OR origin ILIKE $2)
  AND ($3::text IS NULL OR destination ILIKE $3)
ORDER BY departure_date, departure_time, id
LIMIT $4 OFFSET $5;
"#;

pub const COUNT_UPCOMING_RIDES: &str = r#"
SELECT COUNT(*) FROM rides
WHERE status = 'SCHEDULED'
  AND departure_date >= $1
  AND ($2::text IS NULL OR origin ILIKE $2)
  AND ($3::text IS NULL OR destination ILIKE $3);
"#;

pub const RIDES_BY_DRIVER: &str = r#"
SELECT id, driver_id, origin, destination, departure_date, departure_time,
       available_seats, total_seats, fare, status, is_suspicious, created_at, updated_at
FROM rides
WHERE driver_id = $1 AND ($2::text IS NULL OR status = $2)
ORDER BY departure_date, departure_time, id;
"#;

pub const MATCHING_RIDES: &str = r#"
SELECT id, driver_id, origin, destination, departure_date, departure_time,
       available_seats, total_seats, fare, status, is_suspicious, created_at, updated_at
FROM rides
WHERE status = 'SCHEDULED'
  AND origin ILIKE $1
  AND destination ILIKE $2
  AND departure_date = $3
  AND (departure_date + departure_time) BETWEEN $4 AND $5
  AND available_seats >= $6
ORDER BY departure_date, departure_time, id;
"#;

pub const INSERT_RIDE: &str = r#"
INSERT INTO rides (driver_id, origin, destination, departure_date, departure_time,
                   available_seats, total_seats, fare, status)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'SCHEDULED')
RETURNING id, driver_id, origin, destination, departure_date, departure_time,
          available_seats, total_seats, fare, status, is_suspicious, created_at, updated_at;
"#;

pub const UPDATE_RIDE: &str = r#"
UPDATE rides
SET departure_date = $2,
    departure_time = $3,
    fare = $4,
    status = $5,
    updated_at = NOW()
WHERE id = $1
RETURNING id, driver_id, origin, destination, departure_date, departure_time,
          available_seats, total_seats, fare, status, is_suspicious, created_at, updated_at;
"#;

/// Returns no row when the delta would break `0 <= available <= total`.
pub const ADJUST_SEATS: &str = r#"
UPDATE rides
SET available_seats = available_seats + $2,
    updated_at = NOW()
WHERE id = $1
  AND available_seats + $2 >= 0
  AND available_seats + $2 <= total_seats
RETURNING id, driver_id, origin, destination, departure_date, departure_time,
          available_seats, total_seats, fare, status, is_suspicious, created_at, updated_at;
"#;

pub const SELECT_BOOKING: &str = r#"
SELECT id, ride_id, passenger_id, seats_booked, fare, status, rejection_reason, created_at, updated_at
FROM bookings WHERE id = $1;
"#;

pub const LOCK_BOOKING: &str = r#"
SELECT id, ride_id, passenger_id, seats_booked, fare, status, rejection_reason, created_at, updated_at
FROM bookings WHERE id = $1 FOR UPDATE;
"#;

pub const SELECT_ACTIVE_BOOKING: &str = r#"
SELECT id, ride_id, passenger_id, seats_booked, fare, status, rejection_reason, created_at, updated_at
FROM bookings
WHERE ride_id = $1 AND passenger_id = $2 AND status IN ('PENDING', 'CONFIRMED')
ORDER BY id
LIMIT 1;
"#;

pub const LOCK_ACTIVE_BOOKINGS_FOR_RIDE: &str = r#"
SELECT id, ride_id, passenger_id, seats_booked, fare, status, rejection_reason, created_at, updated_at
FROM bookings
WHERE ride_id = $1 AND status IN ('PENDING', 'CONFIRMED')
ORDER BY id
FOR UPDATE;
"#;

pub const BOOKINGS_BY_PASSENGER: &str = r#"
SELECT id, ride_id, passenger_id, seats_booked, fare, status, rejection_reason, created_at, updated_at
FROM bookings
WHERE passenger_id = $1 AND ($2::text IS NULL OR status = $2)
ORDER BY created_at DESC, id DESC;
"#;

pub const BOOKINGS_FOR_RIDE: &str = r#"
SELECT id, ride_id, passenger_id, seats_booked, fare, status, rejection_reason, created_at, updated_at
FROM bookings WHERE ride_id = $1
ORDER BY created_at, id;
"#;

pub const BOOKINGS_FOR_DRIVER: &str = r#"
SELECT b.id, b.ride_id, b.passenger_id, b.seats_booked, b.fare, b.status, b.rejection_reason,
       b.created_at, b.updated_at
FROM bookings b
JOIN rides r ON r.id = b.ride_id
WHERE r.driver_id = $1 AND ($2::text IS NULL OR b.status = $2)
ORDER BY b.created_at, b.id;
"#;

pub const INSERT_BOOKING: &str = r#"
INSERT INTO bookings (ride_id, passenger_id, seats_booked, fare, status)
VALUES ($1, $2, $3, $4, 'PENDING')
RETURNING id, ride_id, passenger_id, seats_booked, fare, status, rejection_reason, created_at, updated_at;
"#;

pub const UPDATE_BOOKING_STATUS: &str = r#"
UPDATE bookings
SET status = $2,
    rejection_reason = COALESCE($3, rejection_reason),
    updated_at = NOW()
WHERE id = $1
RETURNING id, ride_id, passenger_id, seats_booked, fare, status, rejection_reason, created_at, updated_at;
"#;

pub const LOCK_PASSENGER_REQUESTS: &str = r#"
SELECT pg_advisory_xact_lock($1);
"#;

pub const SELECT_REQUEST: &str = r#"
SELECT id, passenger_id, origin, destination, earliest_date, earliest_time, latest_time,
       seats_needed, offer_per_seat, status, expires_at, created_at
FROM ride_requests WHERE id = $1;
"#;

pub const LOCK_REQUEST: &str = r#"
SELECT id, passenger_id, origin, destination, earliest_date, earliest_time, latest_time,
       seats_needed, offer_per_seat, status, expires_at, created_at
FROM ride_requests WHERE id = $1 FOR UPDATE;
"#;

pub const SELECT_ACTIVE_REQUEST_FOR_ROUTE: &str = r#"
SELECT id, passenger_id, origin, destination, earliest_date, earliest_time, latest_time,
       seats_needed, offer_per_seat, status, expires_at, created_at
FROM ride_requests
WHERE passenger_id = $1
  AND origin = $2
  AND destination = $3
  AND earliest_date = $4
  AND status = 'ACTIVE'
LIMIT 1;
"#;

pub const REQUESTS_BY_PASSENGER: &str = r#"
SELECT id, passenger_id, origin, destination, earliest_date, earliest_time, latest_time,
       seats_needed, offer_per_seat, status, expires_at, created_at
FROM ride_requests
WHERE passenger_id = $1 AND ($2::text IS NULL OR status = $2)
ORDER BY created_at DESC, id DESC;
"#;

pub const ACTIVE_REQUESTS: &str = r#"
SELECT id, passenger_id, origin, destination, earliest_date, earliest_time, latest_time,
       seats_needed, offer_per_seat, status, expires_at, created_at
FROM ride_requests
WHERE status = 'ACTIVE'
  AND expires_at >= $1
  AND ($2::text IS NULL OR origin ILIKE $2)
  AND ($3::text IS NULL OR destination ILIKE $3)
  AND ($4::date IS NULL OR earliest_date = $4)
ORDER BY created_at DESC, id DESC;
"#;

pub const INSERT_REQUEST: &str = r#"
INSERT INTO ride_requests (passenger_id, origin, destination, earliest_date, earliest_time,
                           latest_time, seats_needed, offer_per_seat, status, expires_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'ACTIVE', $9)
RETURNING id, passenger_id, origin, destination, earliest_date, earliest_time, latest_time,
          seats_needed, offer_per_seat, status, expires_at, created_at;
"#;

pub const UPDATE_REQUEST_STATUS: &str = r#"
UPDATE ride_requests SET status = $2 WHERE id = $1
RETURNING id, passenger_id, origin, destination, earliest_date, earliest_time, latest_time,
          seats_needed, offer_per_seat, status, expires_at, created_at;
"#;

pub const EXPIRE_REQUESTS: &str = r#"
UPDATE ride_requests SET status = 'EXPIRED'
WHERE status = 'ACTIVE' AND expires_at < $1;
"#;
