use keel::{Connection, Database, Entity};
use rust_decimal::Decimal;
use std::{str::FromStr, sync::Mutex};
use time::{Date, Month, PrimitiveDateTime, Time};
use uuid::Uuid;

#[derive(Entity, Debug, Clone, PartialEq)]
struct SimpleFields {
    id: i64,
    alpha: Option<u8>,
    bravo: Option<i32>,
    charlie: Option<i16>,
    delta: Option<u64>,
    echo: Option<Uuid>,
    foxtrot: Option<f64>,
    golf: Option<Time>,
    hotel: Option<String>,
    india: Option<Decimal>,
    juliet: Option<Date>,
    kilo: Option<PrimitiveDateTime>,
    lima: Option<bool>,
    mike: Option<Vec<u8>>,
}

static MUTEX: Mutex<()> = Mutex::new(());

pub fn simple<C: Connection>(database: &mut Database<C>) {
    let _lock = MUTEX.lock().unwrap();

    // Setup
    database
        .drop_table::<SimpleFields>(true)
        .expect("Failed to drop SimpleFields table");
    database
        .create_table::<SimpleFields>(false)
        .expect("Failed to create SimpleFields table");

    // Simple 1
    let mut entity = SimpleFields {
        id: 0,
        alpha: None,
        bravo: 777.into(),
        charlie: (-2).into(),
        delta: 9876543210.into(),
        echo: None,
        foxtrot: 0.25.into(),
        golf: Time::from_hms(12, 0, 10).unwrap().into(),
        hotel: Some("Hello world!".into()),
        india: Decimal::from_str("1234.56").unwrap().into(),
        juliet: Date::from_calendar_date(2024, Month::February, 29)
            .unwrap()
            .into(),
        kilo: None,
        lima: Some(true),
        mike: None,
    };
    let key = database
        .insert(&mut entity, None)
        .expect("Failed to insert simple 1")
        .expect("The identity was not returned");
    assert_eq!(key, entity.id);
    assert!(entity.id > 0);
    let loaded = database
        .get::<SimpleFields>(entity.id, None)
        .expect("Failed to query simple 1")
        .expect("Failed to find simple 1");
    assert_eq!(loaded, entity);
    assert_eq!(loaded.delta, Some(9876543210));
    assert_eq!(loaded.golf, Some(Time::from_hms(12, 0, 10).unwrap()));

    // Simple 2
    let mut entity = SimpleFields {
        id: 0,
        alpha: 255.into(),
        bravo: None,
        charlie: None,
        delta: None,
        echo: Some(Uuid::parse_str("5e915574-bb30-4430-98cf-c5854f61fbbd").unwrap()),
        foxtrot: None,
        golf: None,
        hotel: None,
        india: None,
        juliet: None,
        kilo: PrimitiveDateTime::new(
            Date::from_calendar_date(1999, Month::December, 31).unwrap(),
            Time::from_hms_milli(23, 59, 59, 250).unwrap(),
        )
        .into(),
        lima: Some(false),
        mike: Some(vec![0, 1, 2, 254, 255]),
    };
    database
        .insert(&mut entity, None)
        .expect("Failed to insert simple 2");
    let loaded = database
        .get::<SimpleFields>(entity.id, None)
        .expect("Failed to query simple 2")
        .expect("Failed to find simple 2");
    assert_eq!(loaded, entity);
    assert_eq!(loaded.alpha, Some(255));
    assert_eq!(loaded.mike.as_deref(), Some(&[0u8, 1, 2, 254, 255][..]));

    let count = database
        .count::<SimpleFields>(None, None)
        .expect("Failed to count the rows");
    assert_eq!(count, 2);
}
