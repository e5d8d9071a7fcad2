//! Graph-level duplication properties: independence, sharing, cycles,
//! skipped fields, container round-trips and map fallbacks.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use replica::{Duplicate, Policy, Session, Shared, duplicate};
use rstest::rstest;

#[derive(Duplicate, Debug, Clone, PartialEq)]
struct Point {
	x: f64,
	y: f64,
	label: String,
}

#[derive(Duplicate)]
struct Node {
	name: String,
	#[duplicate(Duplicate)]
	next: Option<Shared<Node>>,
	#[duplicate(skip)]
	scratch: Vec<u32>,
}

#[derive(Duplicate)]
struct Holder {
	#[duplicate(Duplicate)]
	target: Option<Shared<Point>>,
}

#[derive(Duplicate)]
struct Referrer {
	#[duplicate(Map)]
	by_map: Option<Shared<Point>>,
	#[duplicate(MapOrCopy)]
	by_map_or_copy: Option<Shared<Point>>,
	#[duplicate(MapOrDuplicate)]
	by_map_or_duplicate: Option<Shared<Point>>,
}

#[derive(Duplicate)]
struct Mapped {
	#[duplicate(Map)]
	name: String,
	#[duplicate(Map)]
	count: u32,
	#[duplicate(Map)]
	parts: Vec<u32>,
}

#[derive(Duplicate)]
struct Polyline {
	#[duplicate(Duplicate, elements = Duplicate)]
	points: Vec<Shared<Point>>,
}

fn point(x: f64, y: f64) -> Shared<Point> {
	Shared::new(Point {
		x,
		y,
		label: format!("{x},{y}"),
	})
}

fn node(name: &str) -> Shared<Node> {
	Shared::new(Node {
		name: name.into(),
		next: None,
		scratch: vec![1, 2, 3],
	})
}

#[test]
fn test_value_fields_are_independent() {
	let source = point(1.0, 2.0);
	let copy = duplicate(&source).unwrap();
	assert!(!Shared::ptr_eq(&copy, &source));
	assert_eq!(*copy.borrow(), *source.borrow());

	copy.borrow_mut().label.push_str(" moved");
	copy.borrow_mut().x = 10.0;
	assert_eq!(source.borrow().label, "1,2");
	assert_eq!(source.borrow().x, 1.0);
}

#[test]
fn test_shared_target_stays_shared_across_roots() {
	let c = point(0.0, 0.0);
	let a = Shared::new(Holder {
		target: Some(c.clone()),
	});
	let b = Shared::new(Holder {
		target: Some(c.clone()),
	});

	let mut session = Session::new();
	let a2 = session.duplicate(&a).unwrap();
	let b2 = session.duplicate(&b).unwrap();
	let a2c = a2.borrow().target.clone().unwrap();
	let b2c = b2.borrow().target.clone().unwrap();
	assert!(Shared::ptr_eq(&a2c, &b2c));
	assert!(!Shared::ptr_eq(&a2c, &c));
	assert_eq!(session.stats().duplicated, 3);
}

#[test]
fn test_separate_sessions_do_not_share() {
	let c = point(0.0, 0.0);
	let a = Shared::new(Holder {
		target: Some(c.clone()),
	});
	let first = duplicate(&a).unwrap().borrow().target.clone().unwrap();
	let second = duplicate(&a).unwrap().borrow().target.clone().unwrap();
	assert!(!Shared::ptr_eq(&first, &second));
}

#[test]
fn test_self_reference_maps_to_duplicate() {
	let a = node("a");
	a.borrow_mut().next = Some(a.clone());

	let a2 = duplicate(&a).unwrap();
	let next = a2.borrow().next.clone().unwrap();
	assert!(Shared::ptr_eq(&next, &a2));
	assert!(Shared::ptr_eq(a.borrow().next.as_ref().unwrap(), &a));
}

#[test]
fn test_mutual_references_close_the_cycle() {
	let a = node("a");
	let b = node("b");
	a.borrow_mut().next = Some(b.clone());
	b.borrow_mut().next = Some(a.clone());

	let mut session = Session::new();
	let a2 = session.duplicate(&a).unwrap();
	let b2 = a2.borrow().next.clone().unwrap();
	assert_eq!(b2.borrow().name, "b");
	assert!(Shared::ptr_eq(b2.borrow().next.as_ref().unwrap(), &a2));
	assert!(!Shared::ptr_eq(&b2, &b));
	assert_eq!(session.stats().duplicated, 2);

	// Duplicating the other member afterwards reuses the mapping.
	let again = session.duplicate(&b).unwrap();
	assert!(Shared::ptr_eq(&again, &b2));
}

#[test]
fn test_skipped_field_is_zero_in_every_duplicate() {
	let a = node("a");
	let b = node("b");
	a.borrow_mut().next = Some(b.clone());

	let a2 = duplicate(&a).unwrap();
	let b2 = a2.borrow().next.clone().unwrap();
	assert!(a2.borrow().scratch.is_empty());
	assert!(b2.borrow().scratch.is_empty());
	assert_eq!(a.borrow().scratch, vec![1, 2, 3]);
}

#[rstest]
#[case::map(Policy::Map)]
#[case::map_or_copy(Policy::MapOrCopy)]
#[case::map_or_duplicate(Policy::MapOrDuplicate)]
fn test_mapped_reference_resolves_for_every_map_policy(#[case] policy: Policy) {
	let target = point(3.0, 4.0);
	let referrer = Shared::new(Referrer {
		by_map: Some(target.clone()),
		by_map_or_copy: Some(target.clone()),
		by_map_or_duplicate: Some(target.clone()),
	});

	let mut session = Session::new();
	let target2 = session.duplicate(&target).unwrap();
	let copy = session.duplicate(&referrer).unwrap();
	let copy = copy.borrow();
	let field = match policy {
		Policy::Map => &copy.by_map,
		Policy::MapOrCopy => &copy.by_map_or_copy,
		_ => &copy.by_map_or_duplicate,
	};
	assert!(Shared::ptr_eq(field.as_ref().unwrap(), &target2));
}

#[test]
fn test_unmapped_reference_fallbacks() {
	let target = point(5.0, 6.0);
	let referrer = Shared::new(Referrer {
		by_map: Some(target.clone()),
		by_map_or_copy: Some(target.clone()),
		by_map_or_duplicate: Some(target.clone()),
	});

	let mut session = Session::new();
	let copy = session.duplicate(&referrer).unwrap();
	let copy = copy.borrow();

	// `Map` leaves the field unset.
	assert!(copy.by_map.is_none());
	// `MapOrCopy` keeps the very same reference.
	assert!(Shared::ptr_eq(copy.by_map_or_copy.as_ref().unwrap(), &target));
	// `MapOrDuplicate` creates and registers a duplicate.
	let duplicated = copy.by_map_or_duplicate.clone().unwrap();
	assert!(!Shared::ptr_eq(&duplicated, &target));
	assert_eq!(*duplicated.borrow(), *target.borrow());
	assert!(Shared::ptr_eq(&session.get(&target).unwrap(), &duplicated));
}

#[test]
fn test_field_order_decides_what_map_sees() {
	// `by_map` is populated before `by_map_or_duplicate` registers the
	// target, so it stays unset even though the target ends up mapped.
	let target = point(7.0, 8.0);
	let referrer = Shared::new(Referrer {
		by_map: Some(target.clone()),
		by_map_or_copy: None,
		by_map_or_duplicate: Some(target.clone()),
	});
	let copy = duplicate(&referrer).unwrap();
	assert!(copy.borrow().by_map.is_none());
	assert!(copy.borrow().by_map_or_copy.is_none());
	assert!(copy.borrow().by_map_or_duplicate.is_some());
}

#[test]
fn test_map_leaves_every_identityless_value_unset() {
	let source = Shared::new(Mapped {
		name: "steel".into(),
		count: 7,
		parts: vec![1, 2],
	});
	let mut session = Session::new();
	let copy = session.duplicate(&source).unwrap();
	let copy = copy.borrow();
	assert_eq!(copy.name, "");
	assert_eq!(copy.count, 0);
	assert!(copy.parts.is_empty());
	assert_eq!(session.stats().skipped, 3);

	let conflicts = replica::registry::audit_descriptor(Mapped::descriptor().unwrap());
	assert_eq!(conflicts.len(), 3);
	assert!(
		conflicts
			.iter()
			.all(|c| c.reason == replica::registry::ConflictReason::MapWithoutIdentity)
	);
}

fn points() -> impl Strategy<Value = Vec<(i32, i32)>> {
	prop::collection::vec((-1000i32..1000, -1000i32..1000), 0..24)
}

proptest! {
	#[test]
	fn test_container_round_trip(coords in points()) {
		let source = Shared::new(Polyline {
			points: coords
				.iter()
				.map(|&(x, y)| point(f64::from(x), f64::from(y)))
				.collect(),
		});
		let before: Vec<Point> = source.borrow().points.iter().map(|p| p.borrow().clone()).collect();

		let copy = duplicate(&source).unwrap();
		let copy = copy.borrow();
		let source = source.borrow();
		prop_assert_eq!(copy.points.len(), source.points.len());
		for (dup, orig) in copy.points.iter().zip(&source.points) {
			prop_assert!(!Shared::ptr_eq(dup, orig));
			prop_assert_eq!(&*dup.borrow(), &*orig.borrow());
		}
		let after: Vec<Point> = source.points.iter().map(|p| p.borrow().clone()).collect();
		prop_assert_eq!(before, after);
	}
}
