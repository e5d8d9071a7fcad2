//! Domain-shaped duplication scenarios: materials sharing a tag, structural
//! members as enum variants, hooks, allocation failures and stable ids.

use std::collections::HashMap;

use pretty_assertions::assert_eq;
use replica::{
	Duplicate, DuplicateConfig, DuplicateError, IdentityKey, Session, Shared, StableId, duplicate,
};
use uuid::Uuid;

#[derive(Duplicate, Debug, PartialEq)]
struct Tag {
	label: String,
}

#[derive(Duplicate)]
struct Material {
	#[duplicate(identity)]
	id: Option<Uuid>,
	name: String,
	#[duplicate(MapOrDuplicate)]
	tag: Option<Shared<Tag>>,
}

#[derive(Duplicate)]
struct Profile {
	#[duplicate(identity)]
	id: Uuid,
}

#[derive(Duplicate)]
enum Member {
	Beam {
		length: f64,
		#[duplicate(MapOrDuplicate)]
		material: Option<Shared<Material>>,
	},
	Column(f64, #[duplicate(MapOrDuplicate)] Option<Shared<Material>>),
	Placeholder,
}

#[derive(Duplicate)]
#[duplicate(hook = rebuild_index)]
struct Section {
	name: String,
	#[duplicate(Duplicate, elements = Duplicate)]
	members: Vec<Shared<Member>>,
	#[duplicate(skip)]
	index: HashMap<String, usize>,
}

impl Section {
	fn rebuild_index(&mut self) {
		self.index = self
			.members
			.iter()
			.enumerate()
			.map(|(i, m)| (describe(&m.borrow()), i))
			.collect();
	}
}

/// A required reference is blanked to a fresh node.
#[derive(Duplicate)]
struct Anchored {
	#[duplicate(Duplicate)]
	material: Shared<Material>,
	#[duplicate(skip)]
	backup: Shared<Material>,
}

#[derive(Duplicate)]
#[duplicate(blank = Fastened::placeholder)]
struct Fastened {
	#[duplicate(Duplicate)]
	material: Shared<Material>,
}

impl Fastened {
	fn placeholder(source: &Self) -> Self {
		Self {
			material: source.material.clone(),
		}
	}
}

#[derive(Duplicate)]
struct Assembly {
	#[duplicate(Duplicate)]
	first: Option<Shared<Material>>,
	#[duplicate(Duplicate)]
	broken: Option<Shared<Anchored>>,
}

#[derive(Duplicate)]
struct Labelled(String, #[duplicate(Duplicate)] Option<Shared<Tag>>);

#[derive(Duplicate)]
struct Marker;

fn describe(member: &Member) -> String {
	match member {
		Member::Beam { length, .. } => format!("beam {length}"),
		Member::Column(height, _) => format!("column {height}"),
		Member::Placeholder => "placeholder".into(),
	}
}

fn tag(label: &str) -> Shared<Tag> {
	Shared::new(Tag {
		label: label.into(),
	})
}

fn material(name: &str, tag: &Shared<Tag>) -> Shared<Material> {
	Shared::new(Material {
		id: None,
		name: name.into(),
		tag: Some(tag.clone()),
	})
}

#[test]
fn test_materials_share_one_tag_duplicate() {
	let _ = tracing_subscriber::fmt::try_init();
	let t = tag("structural");
	let m1 = material("steel", &t);
	let m2 = material("concrete", &t);

	let mut session = Session::new();
	let m1_copy = session.duplicate(&m1).unwrap();
	assert_eq!(session.stats().duplicated, 2);
	let m2_copy = session.duplicate(&m2).unwrap();
	assert_eq!(session.stats().duplicated, 3);

	let t1 = m1_copy.borrow().tag.clone().unwrap();
	let t2 = m2_copy.borrow().tag.clone().unwrap();
	assert!(Shared::ptr_eq(&t1, &t2));
	assert!(!Shared::ptr_eq(&t1, &t));
	assert_eq!(*t1.borrow(), *t.borrow());
	assert_eq!(m1_copy.borrow().name, "steel");
	assert_eq!(m2_copy.borrow().name, "concrete");
	assert_eq!(session.stats().mapped, 1);
}

#[test]
fn test_duplicate_all_matches_sequential_roots() {
	let t = tag("shared");
	let roots = [material("a", &t), material("b", &t), material("c", &t)];

	let mut session = Session::new();
	let copies = session.duplicate_all(&roots).unwrap();
	let tags: Vec<_> = copies
		.iter()
		.map(|m| m.borrow().tag.clone().unwrap())
		.collect();
	assert!(tags.windows(2).all(|w| Shared::ptr_eq(&w[0], &w[1])));
	assert_eq!(session.len(), 4);
}

#[test]
fn test_enum_variants_survive_duplication() {
	let steel = material("steel", &tag("metal"));
	let section = Shared::new(Section {
		name: "S1".into(),
		members: vec![
			Shared::new(Member::Beam {
				length: 6.0,
				material: Some(steel.clone()),
			}),
			Shared::new(Member::Column(3.5, Some(steel.clone()))),
			Shared::new(Member::Placeholder),
		],
		index: HashMap::new(),
	});

	let mut session = Session::new();
	let copy = session.duplicate(&section).unwrap();
	let copy = copy.borrow();
	let described: Vec<_> = copy.members.iter().map(|m| describe(&m.borrow())).collect();
	assert_eq!(described, vec!["beam 6", "column 3.5", "placeholder"]);

	let beam_material = match &*copy.members[0].borrow() {
		Member::Beam { material, .. } => material.clone().unwrap(),
		_ => unreachable!(),
	};
	let column_material = match &*copy.members[1].borrow() {
		Member::Column(_, material) => material.clone().unwrap(),
		_ => unreachable!(),
	};
	assert!(Shared::ptr_eq(&beam_material, &column_material));
	assert!(!Shared::ptr_eq(&beam_material, &steel));
}

#[test]
fn test_hook_rebuilds_skipped_index() {
	let section = Shared::new(Section {
		name: "S2".into(),
		members: vec![Shared::new(Member::Placeholder)],
		index: HashMap::from([("stale".to_string(), 9)]),
	});

	let mut session = Session::new();
	let copy = session.duplicate(&section).unwrap();
	assert_eq!(
		copy.borrow().index,
		HashMap::from([("placeholder".to_string(), 0)])
	);
	assert_eq!(session.stats().hooks, 1);
	assert_eq!(section.borrow().index["stale"], 9);
}

#[test]
fn test_required_reference_is_allocated_blank() {
	let steel = material("steel", &tag("t"));
	let spare = material("spare", &tag("s"));
	let anchored = Shared::new(Anchored {
		material: steel.clone(),
		backup: spare.clone(),
	});

	let mut session = Session::new();
	let copy = session.duplicate(&anchored).unwrap();
	let copy = copy.borrow();
	assert!(!Shared::ptr_eq(&copy.material, &steel));
	assert_eq!(copy.material.borrow().name, "steel");
	assert!(Shared::ptr_eq(&session.get(&steel).unwrap(), &copy.material));

	// The skipped reference keeps its blank node, unregistered and empty.
	assert!(!Shared::ptr_eq(&copy.backup, &spare));
	assert!(copy.backup.borrow().name.is_empty());
	assert!(copy.backup.borrow().tag.is_none());
	assert!(!session.contains(&spare));
}

#[test]
fn test_failed_root_rolls_back_only_itself() {
	let kept = material("kept", &tag("k"));
	let broken = Shared::new(Anchored {
		material: kept.clone(),
		backup: kept.clone(),
	});
	let assembly = Shared::new(Assembly {
		first: Some(material("first", &tag("f"))),
		broken: Some(broken.clone()),
	});

	let mut session = Session::new();
	session.duplicate(&kept).unwrap();
	let before = (session.len(), *session.stats());

	let _guard = broken.borrow_mut();
	let err = session.duplicate(&assembly).unwrap_err();
	assert!(matches!(err, DuplicateError::Borrowed { .. }));
	assert_eq!((session.len(), *session.stats()), before);
	assert!(session.contains(&kept));
	assert!(!session.contains(&assembly));
}

#[test]
fn test_blank_path_allocates_required_reference() {
	let steel = material("steel", &tag("t"));
	let fastened = Shared::new(Fastened {
		material: steel.clone(),
	});
	let copy = duplicate(&fastened).unwrap();
	let copied = copy.borrow().material.clone();
	assert!(!Shared::ptr_eq(&copied, &steel));
	assert_eq!(copied.borrow().name, "steel");
}

#[test]
fn test_stable_ids_join_distinct_allocations() {
	let id = Uuid::from_u128(0x5eed);
	let t = tag("t");
	let loaded_once = Shared::new(Material {
		id: Some(id),
		name: "steel".into(),
		tag: Some(t.clone()),
	});
	let loaded_twice = Shared::new(Material {
		id: Some(id),
		name: "steel".into(),
		tag: Some(t),
	});

	let mut session = Session::new();
	let first = session.duplicate(&loaded_once).unwrap();
	let second = session.duplicate(&loaded_twice).unwrap();
	assert!(Shared::ptr_eq(&first, &second));
	assert!(session.contains_key(IdentityKey::Stable(StableId::from(id))));
}

#[test]
fn test_stable_id_reused_by_another_type_conflicts() {
	let id = Uuid::from_u128(0xc0ffee);
	let steel = Shared::new(Material {
		id: Some(id),
		name: "steel".into(),
		tag: None,
	});
	let profile = Shared::new(Profile { id });

	let mut session = Session::new();
	session.duplicate(&steel).unwrap();
	let err = session.duplicate(&profile).unwrap_err();
	match err {
		DuplicateError::IdentityConflict { key, .. } => {
			assert_eq!(key, IdentityKey::Stable(StableId::from(id)));
		}
		other => panic!("unexpected error: {other}"),
	}
	assert_eq!(session.len(), 1);
}

#[test]
fn test_config_sets_default_element_policy() {
	let config = DuplicateConfig::from_toml_str("default-element-policy = \"duplicate\"").unwrap();
	let t = tag("t");
	let tags = Shared::new(vec![t.clone(), t.clone()]);

	let mut session = Session::with_config(config);
	let copy = session.duplicate(&tags).unwrap();
	let copy = copy.borrow();
	assert!(Shared::ptr_eq(&copy[0], &copy[1]));
	assert!(!Shared::ptr_eq(&copy[0], &t));
}

#[test]
fn test_config_depth_limit() {
	let config = DuplicateConfig::from_toml_str("max-depth = 1").unwrap();
	let m = material("steel", &tag("t"));
	let err = Session::with_config(config).duplicate(&m).unwrap_err();
	assert!(matches!(err, DuplicateError::DepthLimit { limit: 1, .. }));
}

#[test]
fn test_tuple_and_unit_structs() {
	let t = tag("t");
	let labelled = Shared::new(Labelled("first".into(), Some(t.clone())));
	let copy = duplicate(&labelled).unwrap();
	assert_eq!(copy.borrow().0, "first");
	assert!(!Shared::ptr_eq(copy.borrow().1.as_ref().unwrap(), &t));

	let marker = Shared::new(Marker);
	assert!(!Shared::ptr_eq(&duplicate(&marker).unwrap(), &marker));

	let desc = Labelled::descriptor().unwrap();
	let names: Vec<_> = desc.fields.iter().map(|f| f.name).collect();
	assert_eq!(names, vec!["0", "1"]);
}

#[test]
fn test_enum_descriptor_names_variant_fields() {
	let desc = Member::descriptor().unwrap();
	let names: Vec<_> = desc.fields.iter().map(|f| f.name).collect();
	assert_eq!(names, vec!["Beam.length", "Beam.material", "Column.0", "Column.1"]);
	assert_eq!(
		desc.field_policy("Column.1").unwrap().field,
		replica::Policy::MapOrDuplicate
	);
	assert!(replica::registry::find("Member").is_some());
}
