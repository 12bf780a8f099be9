mod common;

use chrono::{Datelike, NaiveDate, Weekday};
use common::session;
use pxstat::{LiveRegisterOptions, live_register_dates};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn defaults_to_all_ages_both_sexes() {
    let (cso, _) = session();
    let lr = cso.live_register(&LiveRegisterOptions::default()).unwrap();
    assert_eq!(lr.rows.len(), 4);
    assert!(lr.rows.iter().all(|r| r.age_group == "All ages" && r.sex == "Both sexes"));
    let counts: Vec<_> = lr.rows.iter().map(|r| r.values[0]).collect();
    assert_eq!(
        counts,
        [Some(50000.0), Some(413000.0), Some(436000.0), Some(180000.0)]
    );
}

#[test]
fn start_bound_is_inclusive_and_order_kept() {
    let (cso, _) = session();
    let opts = LiveRegisterOptions {
        start: Some(date(2010, 1, 1)),
        ..LiveRegisterOptions::default()
    };
    let lr = cso.live_register(&opts).unwrap();
    let months: Vec<_> = lr.rows.iter().map(|r| r.month).collect();
    assert_eq!(months, [date(2010, 1, 1), date(2022, 6, 1)]);

    assert_eq!(lr.rows[0].reference_date, date(2010, 1, 29));
    assert_eq!(lr.rows[0].extract_date, date(2010, 1, 31));
    assert_eq!(lr.rows[1].reference_date, date(2022, 6, 30));
    assert_eq!(lr.rows[1].extract_date, date(2022, 7, 3));
}

#[test]
fn mid_month_start_drops_that_month() {
    let (cso, _) = session();
    let start = date(2009, 12, 15);
    let opts = LiveRegisterOptions {
        start: Some(start),
        ..LiveRegisterOptions::default()
    };
    let lr = cso.live_register(&opts).unwrap();
    let months: Vec<_> = lr.rows.iter().map(|r| r.month).collect();
    assert_eq!(months, [date(2010, 1, 1), date(2022, 6, 1)]);
    assert!(lr.rows.iter().all(|r| r.month >= start));
}

#[test]
fn end_bound_and_extra_categories() {
    let (cso, _) = session();
    let opts = LiveRegisterOptions {
        end: Some(date(2009, 12, 15)),
        sexes: vec!["Both sexes".into(), "Male".into()],
        ..LiveRegisterOptions::default()
    };
    let lr = cso.live_register(&opts).unwrap();
    assert_eq!(lr.rows.len(), 4);
    assert!(lr.rows.iter().all(|r| r.month <= date(2009, 12, 15)));
    assert_eq!(lr.rows[3].month, date(2009, 12, 1));

    let t = lr.to_table();
    assert_eq!(
        t.index,
        vec!["Month", "Age Group", "Sex", "reference_date", "extract_date"]
    );
    assert_eq!(t.rows[1].key[..3], ["1967-01", "All ages", "Male"]);
}

#[test]
fn reference_dates_switch_weekday_in_may_2015() {
    for d in live_register_dates(date(1967, 1, 1), date(2030, 12, 1)) {
        let expected = if d.month < date(2015, 5, 1) {
            Weekday::Fri
        } else {
            Weekday::Thu
        };
        assert_eq!(d.reference_date.weekday(), expected, "{}", d.month);
        assert_eq!(d.reference_date.month(), d.month.month());
        assert!(d.reference_date.day() > 21);
        assert_eq!(d.extract_date.weekday(), Weekday::Sun);
    }
}

#[test]
fn bad_arguments_are_usage_errors() {
    let (cso, transport) = session();
    let backwards = LiveRegisterOptions {
        start: Some(date(2020, 1, 1)),
        end: Some(date(2019, 1, 1)),
        ..LiveRegisterOptions::default()
    };
    assert!(cso.live_register(&backwards).unwrap_err().is_usage());
    assert_eq!(transport.calls(), 0);

    let unknown = LiveRegisterOptions {
        age_groups: vec!["Over 100".into()],
        ..LiveRegisterOptions::default()
    };
    assert!(cso.live_register(&unknown).unwrap_err().is_usage());

    let no_sexes = LiveRegisterOptions {
        sexes: Vec::new(),
        ..LiveRegisterOptions::default()
    };
    assert!(cso.live_register(&no_sexes).unwrap_err().is_usage());
    let no_ages = LiveRegisterOptions {
        age_groups: Vec::new(),
        ..LiveRegisterOptions::default()
    };
    assert!(cso.live_register(&no_ages).unwrap_err().is_usage());
    assert_eq!(transport.calls(), 1);
}
