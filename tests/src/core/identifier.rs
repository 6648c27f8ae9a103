use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use sleuth_core::{
    Bytecode, BytecodeKind, ContractIdentity, ContractsIdentifier, EvmMessageTrace,
    IdentifierConfig, ImmutableReference, MetadataScanBound, index_bytecodes,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// Constructor guard, calldata size check, selector load, then `PUSH1 0 DUP1 REVERT INVALID`
const RUNTIME_BODY: &str = "6080604052348015600f57600080fd5b50600436106100415760003560e01c80";
const METADATA_BOUNDARY: &str = "600080fdfe";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Runtime code ending in a CBOR metadata trailer whose 32-byte hash is `hash_byte` repeated.
fn with_metadata(hash_byte: u8) -> String {
    format!(
        "{RUNTIME_BODY}{METADATA_BOUNDARY}a2646970667358221220{}64736f6c634300081c0033",
        format!("{hash_byte:02x}").repeat(32)
    )
}

fn bytecode(
    name: &str,
    kind: BytecodeKind,
    hex: &str,
    library_address_positions: Vec<usize>,
    immutable_references: Vec<ImmutableReference>,
) -> Arc<Bytecode> {
    Arc::new(
        Bytecode::new(
            ContractIdentity::new(format!("contracts/{name}.sol"), name),
            kind,
            &hex::decode(hex).unwrap(),
            library_address_positions,
            immutable_references,
        )
        .unwrap(),
    )
}

fn runtime(name: &str, hex: &str) -> Arc<Bytecode> {
    bytecode(name, BytecodeKind::Runtime, hex, vec![], vec![])
}

fn deployment(name: &str, hex: &str) -> Arc<Bytecode> {
    bytecode(name, BytecodeKind::Deployment, hex, vec![], vec![])
}

fn call(hex: &str) -> EvmMessageTrace {
    EvmMessageTrace::call(hex::decode(hex).unwrap())
}

fn create(hex: &str) -> EvmMessageTrace {
    EvmMessageTrace::create(hex::decode(hex).unwrap())
}

fn identified(identifier: &ContractsIdentifier, trace: &EvmMessageTrace) -> Option<String> {
    identifier
        .identify(trace)
        .unwrap()
        .map(|bytecode| bytecode.identity().name.clone())
}

#[test]
fn test_single_runtime_exact_and_miss() {
    init_tracing();
    let identifier = index_bytecodes(IdentifierConfig::default(), [runtime("One", "6001")]);

    assert_eq!(identified(&identifier, &call("6001")).as_deref(), Some("One"));
    assert_eq!(identified(&identifier, &call("6002")), None);
}

#[test]
fn test_deployment_with_constructor_arguments() {
    init_tracing();
    let identifier = index_bytecodes(
        IdentifierConfig::default(),
        [deployment("Deploy", "600160026003")],
    );

    assert_eq!(
        identified(&identifier, &create("600160026003AABBCCDD")).as_deref(),
        Some("Deploy")
    );
    assert_eq!(identified(&identifier, &call("600160026003AABBCCDD")), None);
}

#[test]
fn test_longest_deployment_prefix_wins() {
    let identifier = index_bytecodes(
        IdentifierConfig::default(),
        [deployment("Short", "6001"), deployment("Long", "60016002")],
    );

    assert_eq!(
        identified(&identifier, &create("60016002aabb")).as_deref(),
        Some("Long")
    );
    assert_eq!(
        identified(&identifier, &create("6001aabb")).as_deref(),
        Some("Short")
    );
}

#[test]
fn test_query_shorter_than_registered_code() {
    let identifier = index_bytecodes(IdentifierConfig::default(), [runtime("Full", "60016002")]);
    assert_eq!(identified(&identifier, &call("6001")), None);
    assert_eq!(identified(&identifier, &call("")), None);
}

#[test]
fn test_exact_round_trip_from_raw_code() {
    init_tracing();
    let library_offset = RUNTIME_BODY.len() / 2 + 1;
    let linked = format!("{RUNTIME_BODY}73{}5af4", "ab".repeat(20));
    let with_immutable = format!("{RUNTIME_BODY}7f{}50", "cd".repeat(32));

    let registered = [
        runtime("Plain", &with_metadata(0x01)),
        bytecode("Linked", BytecodeKind::Runtime, &linked, vec![library_offset], vec![]),
        bytecode(
            "Immutable",
            BytecodeKind::Runtime,
            &with_immutable,
            vec![],
            vec![ImmutableReference::new(RUNTIME_BODY.len() / 2 + 1, 32)],
        ),
    ];
    let identifier = index_bytecodes(IdentifierConfig::default(), registered);

    assert_eq!(
        identified(&identifier, &call(&with_metadata(0x01))).as_deref(),
        Some("Plain")
    );
    assert_eq!(identified(&identifier, &call(&linked)).as_deref(), Some("Linked"));
    assert_eq!(
        identified(&identifier, &call(&with_immutable)).as_deref(),
        Some("Immutable")
    );
}

#[test]
fn test_insertion_order_independence() {
    let codes = [
        ("A", "6080604052"),
        ("B", "608060405260"),
        ("C", "6080604053"),
        ("D", "60806040526004"),
        ("E", "7f"),
        ("F", "6080"),
    ];

    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..8 {
        let mut order = codes.to_vec();
        order.shuffle(&mut rng);

        let identifier = index_bytecodes(
            IdentifierConfig::default(),
            order.iter().map(|(name, hex)| runtime(name, hex)),
        );
        assert_eq!(identifier.len(), codes.len());

        for (name, hex) in codes {
            assert_eq!(
                identified(&identifier, &call(hex)).as_deref(),
                Some(name),
                "order {:?}",
                order
            );
        }
    }
}

#[test]
fn test_idempotent_registration() {
    let code = with_metadata(0x07);
    let first = runtime("Twice", &code);

    let mut identifier = ContractsIdentifier::default();
    identifier.add_bytecode(Arc::clone(&first));
    let before = identifier.identify(&call(&code)).unwrap();

    identifier.add_bytecode(Arc::clone(&first));
    assert_eq!(identifier.len(), 1);
    let after = identifier.identify(&call(&code)).unwrap();

    assert_eq!(before, after);
    assert_eq!(after.as_deref(), Some(first.as_ref()));
}

#[test]
fn test_library_address_tolerance() {
    init_tracing();
    let offset = RUNTIME_BODY.len() / 2 + 1;
    let compiled = format!("{RUNTIME_BODY}73{}5af4", "00".repeat(20));
    let observed = format!("{RUNTIME_BODY}73{}5af4", "1f".repeat(20));

    let identifier = index_bytecodes(
        IdentifierConfig::default(),
        [
            runtime("Neighbour", &format!("{RUNTIME_BODY}5b00")),
            bytecode("UsesLib", BytecodeKind::Runtime, &compiled, vec![offset], vec![]),
        ],
    );

    assert_eq!(
        identified(&identifier, &call(&observed)).as_deref(),
        Some("UsesLib")
    );
}

#[test]
fn test_unlinked_placeholder_resolves_linked_code() {
    let placeholder = format!("__${}$__", "3c".repeat(17));
    let unlinked = format!("0x{RUNTIME_BODY}73{placeholder}5af4");
    let linked = format!("{RUNTIME_BODY}73{}5af4", "42".repeat(20));

    let bytecode = Bytecode::from_unlinked_hex(
        ContractIdentity::new("contracts/UsesLib.sol", "UsesLib"),
        BytecodeKind::Runtime,
        &unlinked,
        vec![],
    )
    .unwrap();
    let identifier = index_bytecodes(IdentifierConfig::default(), [Arc::new(bytecode)]);

    assert_eq!(
        identified(&identifier, &call(&linked)).as_deref(),
        Some("UsesLib")
    );
}

#[test]
fn test_immutable_slot_tolerance() {
    let offset = RUNTIME_BODY.len() / 2 + 1;
    let compiled = format!("{RUNTIME_BODY}7f{}50", "00".repeat(32));
    let observed = format!("{RUNTIME_BODY}7f{}50", "9e".repeat(32));

    let identifier = index_bytecodes(
        IdentifierConfig::default(),
        [bytecode(
            "Owned",
            BytecodeKind::Runtime,
            &compiled,
            vec![],
            vec![ImmutableReference::new(offset, 32)],
        )],
    );

    assert_eq!(identified(&identifier, &call(&observed)).as_deref(), Some("Owned"));
}

#[test]
fn test_library_call_protection_is_ignored() {
    let deployed_at = |byte: &str| format!("73{}3014", byte.repeat(20));
    let identifier = index_bytecodes(
        IdentifierConfig::default(),
        [runtime("Lib", &deployed_at("00"))],
    );

    assert_eq!(
        identified(&identifier, &call(&deployed_at("5c"))).as_deref(),
        Some("Lib")
    );
}

#[test]
fn test_metadata_hash_tolerance_is_deterministic() {
    init_tracing();
    let build = || {
        index_bytecodes(
            IdentifierConfig::default(),
            [
                runtime("First", &with_metadata(0x11)),
                runtime("Second", &with_metadata(0x22)),
            ],
        )
    };

    let drifted = call(&with_metadata(0x33));
    let answer = identified(&build(), &drifted);
    assert!(matches!(answer.as_deref(), Some("First" | "Second")));

    for _ in 0..3 {
        assert_eq!(identified(&build(), &drifted), answer);
    }
    assert_eq!(answer.as_deref(), Some("Second"));
}

#[test]
fn test_metadata_fallback_needs_boundary() {
    // Same layout without the REVERT INVALID pair
    let without_boundary = |hash: &str| format!("{RUNTIME_BODY}a2646970667358221220{hash}");
    let identifier = index_bytecodes(
        IdentifierConfig::default(),
        [runtime("NoBoundary", &without_boundary(&"11".repeat(32)))],
    );

    assert_eq!(
        identified(&identifier, &call(&without_boundary(&"22".repeat(32)))),
        None
    );
}

#[test]
fn test_metadata_fallback_scan_reaches_past_divergence() {
    init_tracing();
    // The match ends inside the first PUSH1 immediate, one byte short of the REVERT INVALID pair
    let variants = || [runtime("First", "6001fdfe1111"), runtime("Second", "6001fdfe2222")];
    let drifted = call("6002fdfe3333");

    let identifier = index_bytecodes(IdentifierConfig::default(), variants());
    assert_eq!(identified(&identifier, &drifted).as_deref(), Some("Second"));

    let strict = IdentifierConfig::default().with_scan_bound(MetadataScanBound::MatchedBytes);
    let identifier = index_bytecodes(strict, variants());
    assert_eq!(identified(&identifier, &drifted), None);
}

#[test]
fn test_bytecodes_from_json_artifacts() {
    init_tracing();
    let artifacts = serde_json::json!([
        {
            "identity": { "source_name": "contracts/Token.sol", "name": "Token" },
            "kind": "runtime",
            "code": format!("0x{}", with_metadata(0x11)),
        },
        {
            "identity": { "source_name": "contracts/Vault.sol", "name": "Vault" },
            "kind": "runtime",
            "code": "0x7f11223344556677881122334455667788112233445566778811223344556677885000",
            "immutable_references": [{ "start": 1, "length": 32 }],
        },
    ]);
    let bytecodes: Vec<Bytecode> = serde_json::from_value(artifacts).unwrap();
    assert_eq!(bytecodes[1].immutable_references(), &[ImmutableReference::new(1, 32)]);

    let identifier = index_bytecodes(
        IdentifierConfig::default(),
        bytecodes.into_iter().map(Arc::new),
    );
    assert_eq!(identifier.len(), 2);

    assert_eq!(
        identified(&identifier, &call(&with_metadata(0x11))).as_deref(),
        Some("Token")
    );
    let deployed = format!("7f{}5000", "ab".repeat(32));
    assert_eq!(identified(&identifier, &call(&deployed)).as_deref(), Some("Vault"));

    // Serialized entries load back into an equivalent index
    let echo = runtime("Echo", "6001");
    let encoded = serde_json::to_string(&[echo.as_ref()]).unwrap();
    let reloaded: Vec<Bytecode> = serde_json::from_str(&encoded).unwrap();
    assert_eq!(reloaded[0], *echo);
    let identifier = index_bytecodes(
        IdentifierConfig::default(),
        reloaded.into_iter().map(Arc::new),
    );
    assert_eq!(identified(&identifier, &call("6001")).as_deref(), Some("Echo"));
}

#[test]
fn test_cache_coherence() {
    init_tracing();
    let drifted_code = with_metadata(0x33);
    let drifted = call(&drifted_code);

    let mut identifier = ContractsIdentifier::default();
    identifier.add_bytecode(runtime("Old", &with_metadata(0x11)));

    let first = identifier.identify(&drifted).unwrap();
    let second = identifier.identify(&drifted).unwrap();
    assert_eq!(first, second);
    assert_eq!(identified(&identifier, &drifted).as_deref(), Some("Old"));

    // The exact registration must not be masked by the cached fallback
    identifier.add_bytecode(runtime("Exact", &drifted_code));
    assert_eq!(identified(&identifier, &drifted).as_deref(), Some("Exact"));
}

#[test]
fn test_cache_disabled_gives_same_answers() {
    let registered = || {
        [
            runtime("First", &with_metadata(0x11)),
            deployment("Deploy", "600160026003"),
        ]
    };
    let cached = index_bytecodes(IdentifierConfig::default(), registered());
    let uncached = index_bytecodes(IdentifierConfig::default().with_cache(false), registered());

    let traces = [
        call(&with_metadata(0x11)),
        call(&with_metadata(0x44)),
        create("600160026003ffff"),
        call("600160026003ffff"),
    ];
    for trace in &traces {
        for _ in 0..2 {
            assert_eq!(identified(&cached, trace), identified(&uncached, trace));
        }
    }
    assert_eq!(uncached.cached_len(), 0);
}

#[test]
fn test_concurrent_lookups() {
    let identifier = index_bytecodes(
        IdentifierConfig::default(),
        [
            runtime("First", &with_metadata(0x11)),
            runtime("Second", &with_metadata(0x22)),
        ],
    );

    std::thread::scope(|scope| {
        for hash in [0x11u8, 0x22, 0x33, 0x44] {
            let identifier = &identifier;
            scope.spawn(move || {
                let trace = call(&with_metadata(hash));
                for _ in 0..16 {
                    assert!(identified(identifier, &trace).is_some());
                }
            });
        }
    });
}
