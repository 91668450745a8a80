use rstest::rstest;
use tank_core::{EntryOutcome, NumberFormat, NumericEntryState, ValidationError};
use tank_traits::KeyEvent;

#[derive(Default)]
struct Target {
    value: Option<f64>,
}

fn set(t: &mut Target, v: f64) -> Result<(), ValidationError> {
    t.value = Some(v);
    Ok(())
}

fn type_keys(e: &mut NumericEntryState<Target>, t: &mut Target, keys: &str) -> EntryOutcome {
    let mut last = EntryOutcome::Editing;
    for c in keys.chars() {
        let key = match c {
            '.' => KeyEvent::DecimalPoint,
            'C' => KeyEvent::Clear,
            'S' => KeyEvent::Select,
            'B' => KeyEvent::Back,
            d => KeyEvent::Digit(d.to_digit(10).unwrap() as u8),
        };
        last = e.handle_key(key, t);
    }
    last
}

#[rstest]
fn digits_then_select_commit() {
    let mut t = Target::default();
    let mut e = NumericEntryState::new("Set", NumberFormat::Integer, 1.0, 99.0, set);
    assert_eq!(type_keys(&mut e, &mut t, "25S"), EntryOutcome::Committed(25.0));
    assert_eq!(t.value, Some(25.0));
}

#[rstest]
fn back_cancels_without_commit() {
    let mut t = Target::default();
    let mut e = NumericEntryState::new("Set", NumberFormat::Integer, 1.0, 99.0, set);
    assert_eq!(type_keys(&mut e, &mut t, "25B"), EntryOutcome::Cancelled);
    assert_eq!(t.value, None);
}

#[rstest]
#[case("", ValidationError::Malformed)]
#[case(".", ValidationError::Malformed)]
#[case("15.5", ValidationError::OutOfRange { min: 0.0, max: 14.0 })]
fn bad_input_is_rejected_and_kept(#[case] typed: &str, #[case] expected: ValidationError) {
    let mut t = Target::default();
    let mut e = NumericEntryState::new("pH", NumberFormat::Decimal { places: 3 }, 0.0, 14.0, set);
    type_keys(&mut e, &mut t, typed);
    assert_eq!(e.handle_key(KeyEvent::Select, &mut t), EntryOutcome::Rejected(expected));
    assert_eq!(e.buffer(), typed);
    assert_eq!(t.value, None);
}

#[rstest]
fn decimal_places_and_point_are_limited() {
    let mut t = Target::default();
    let mut e = NumericEntryState::new("pH", NumberFormat::Decimal { places: 2 }, 0.0, 14.0, set);
    type_keys(&mut e, &mut t, "7..1234");
    assert_eq!(e.buffer(), "7.12");

    let mut i = NumericEntryState::new("id", NumberFormat::Integer, 1.0, 99.0, set);
    type_keys(&mut i, &mut t, "4.2");
    assert_eq!(i.buffer(), "42");
}

#[rstest]
fn length_is_capped_and_clear_empties() {
    let mut t = Target::default();
    let mut e = NumericEntryState::new("n", NumberFormat::Integer, 0.0, 1e12, set);
    type_keys(&mut e, &mut t, "1234567890");
    assert_eq!(e.buffer(), "12345678");
    type_keys(&mut e, &mut t, "C");
    assert_eq!(e.buffer(), "");
}

#[rstest]
fn failed_commit_keeps_entry_open() {
    fn refuse(_: &mut Target, _: f64) -> Result<(), ValidationError> {
        Err(ValidationError::Malformed)
    }
    let mut t = Target::default();
    let mut e = NumericEntryState::new("n", NumberFormat::Integer, 0.0, 10.0, refuse);
    assert!(matches!(type_keys(&mut e, &mut t, "5S"), EntryOutcome::Rejected(_)));
    assert_eq!(e.buffer(), "5");
    assert!(e.error().is_some());
}
