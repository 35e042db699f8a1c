// crates.io
use time::macros;
// self
use seo_mcp::{
	_preludet::*,
	credential::{QueryMode, QueryTarget, Signature},
	store::{CacheLookup, MemoryStore, MissReason, SignatureStore},
};

fn make_target(domain: &str) -> QueryTarget {
	QueryTarget::subdomains(domain).expect("Failed to build query target for store tests.")
}

fn build_signature(target: &QueryTarget, value: &str, valid_until: OffsetDateTime) -> Signature {
	Signature::builder(target.clone())
		.signature(value)
		.issued_at(macros::datetime!(2025-11-10 12:00 UTC))
		.valid_until(valid_until)
		.overview(Some(serde_json::json!({ "signature": value })))
		.build()
		.expect("Signature fixture should build successfully.")
}

#[tokio::test]
async fn save_then_lookup_returns_signature_unchanged() {
	let store = MemoryStore::default();
	let target = make_target("example.com");
	let signature =
		build_signature(&target, "sig-1", macros::datetime!(2025-11-10 13:00 UTC));

	store.save(signature.clone()).await.expect("Saving signature fixture should succeed.");

	let lookup = <dyn SignatureStore>::lookup(
		&store,
		&target,
		macros::datetime!(2025-11-10 12:30 UTC),
		Duration::ZERO,
	)
	.await
	.expect("Lookup should succeed.");

	assert_eq!(lookup, CacheLookup::Hit(signature));
}

#[tokio::test]
async fn expiry_is_exclusive_and_entries_are_keyed_by_mode() {
	let store = MemoryStore::default();
	let target = make_target("example.com");
	let exact = QueryTarget::new("example.com", QueryMode::Exact)
		.expect("Exact target fixture should build.");
	let valid_until = macros::datetime!(2025-11-10 13:00 UTC);

	store
		.save(build_signature(&target, "sig-1", valid_until))
		.await
		.expect("Saving signature fixture should succeed.");

	let at_deadline = <dyn SignatureStore>::lookup(&store, &target, valid_until, Duration::ZERO)
		.await
		.expect("Lookup should succeed.");
	let other_mode = <dyn SignatureStore>::lookup(&store, &exact, valid_until, Duration::ZERO)
		.await
		.expect("Lookup should succeed.");

	assert_eq!(at_deadline, CacheLookup::Miss(MissReason::Expired));
	assert_eq!(other_mode, CacheLookup::Miss(MissReason::Absent));
}

#[tokio::test]
async fn normalized_targets_share_one_entry() {
	let store = MemoryStore::default();
	let signature = build_signature(
		&make_target("https://Example.com/"),
		"sig-1",
		macros::datetime!(2025-11-10 13:00 UTC),
	);

	store.save(signature).await.expect("Saving signature fixture should succeed.");

	let fetched = store
		.fetch(&make_target("example.com"))
		.await
		.expect("Fetch should succeed.")
		.expect("Normalized target should find the entry.");

	assert_eq!(fetched.signature.expose(), "sig-1");
	assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn concurrent_saves_leave_one_self_consistent_entry() {
	let store = MemoryStore::default();
	let target = make_target("example.com");
	let store_a = store.clone();
	let store_b = store.clone();
	let target_a = target.clone();
	let target_b = target.clone();
	let task_a = tokio::spawn(async move {
		store_a
			.save(build_signature(&target_a, "sig-a", macros::datetime!(2025-11-10 13:00 UTC)))
			.await
			.expect("Save task A should complete successfully.")
	});
	let task_b = tokio::spawn(async move {
		store_b
			.save(build_signature(&target_b, "sig-b", macros::datetime!(2025-11-10 14:00 UTC)))
			.await
			.expect("Save task B should complete successfully.")
	});
	let (outcome_a, outcome_b) = tokio::join!(task_a, task_b);

	outcome_a.expect("Save task A should not panic.");
	outcome_b.expect("Save task B should not panic.");

	let final_entry = store
		.fetch(&target)
		.await
		.expect("Fetching final entry should succeed.")
		.expect("Final entry should remain present.");

	match final_entry.signature.expose() {
		"sig-a" => assert_eq!(final_entry.valid_until, macros::datetime!(2025-11-10 13:00 UTC)),
		"sig-b" => assert_eq!(final_entry.valid_until, macros::datetime!(2025-11-10 14:00 UTC)),
		other => panic!("Unexpected signature value: {other}."),
	}

	assert_eq!(
		final_entry.overview,
		Some(serde_json::json!({ "signature": final_entry.signature.expose() }))
	);
	assert_eq!(store.len(), 1);
}
