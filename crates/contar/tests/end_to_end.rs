//! End-to-end tests: instrument, execute, save at exit, load back.

use contar::class::{AccessFlags, JumpCond, ReturnKind};
use contar::data::lock_class;
use contar::prelude::*;
use std::sync::{Arc, Once};
use std::thread;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Fixtures
// ============================================================================

fn marker(line: u32, label: u32) -> [Insn; 2] {
    [
        Insn::Label(Label::new(label)),
        Insn::Line {
            line,
            start: Label::new(label),
        },
    ]
}

/// ```text
/// 1: if (x > 0) {
/// 2:     return 1; }
/// 3: return -1;
/// ```
fn sign_class() -> ClassFile {
    let mut code = Vec::new();
    code.extend(marker(1, 0));
    code.extend([
        Insn::Load(0),
        Insn::Jump {
            cond: JumpCond::IfLe,
            target: Label::new(2),
        },
    ]);
    code.extend(marker(2, 1));
    code.extend([Insn::Const(1), Insn::Return(ReturnKind::Value)]);
    code.extend(marker(3, 2));
    code.extend([Insn::Const(-1), Insn::Return(ReturnKind::Value)]);
    ClassFile::new("app/Sign").with_method(
        MethodNode::new("sign", "(I)I")
            .with_access(AccessFlags::PUBLIC | AccessFlags::STATIC)
            .with_code(code),
    )
}

fn instrument(storage: CounterStorage) -> (Arc<ProjectData>, ClassFile) {
    init_tracing();
    let project = Arc::new(ProjectData::new());
    let config = InstrumentationConfig::builder().storage(storage).build();
    let instrumenter = Instrumenter::new(Arc::clone(&project), config).unwrap();
    let class = instrumenter.instrument_class(&sign_class()).unwrap().unwrap();
    (project, class)
}

// ============================================================================
// Save / load
// ============================================================================

#[test]
fn true_path_survives_save_and_load() {
    let (project, class) = instrument(CounterStorage::ClassArray);
    let mut sim = Simulator::for_project(&class, &project).unwrap();
    assert_eq!(sim.invoke("sign", "(I)I", &[7]).unwrap(), Some(1));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contar.bin");
    let hook = SaveHook::new(Arc::clone(&project), &path, CURRENT_PROTOCOL_VERSION);
    assert!(hook.run().unwrap());
    assert!(!hook.run().unwrap());

    let loaded = load(&path).into_result().unwrap();
    assert_eq!(loaded.class_names(), vec!["app.Sign"]);
    let handle = loaded.class_data("app.Sign").unwrap();
    let data = lock_class(&handle);
    let hits: Vec<(u32, u32)> = data.lines().map(|l| (l.line_number(), l.hits())).collect();
    assert_eq!(hits, vec![(1, 1), (2, 1), (3, 0)]);

    let jump = &data.line(1).unwrap().jumps()[0];
    // IfLe not taken: the true arm count stays zero
    assert_eq!((jump.true_hits(), jump.false_hits()), (0, 1));
    assert_eq!(data.line(2).unwrap().method_signature(), "sign(I)I");
}

#[test]
fn both_paths_counted() {
    let (project, class) = instrument(CounterStorage::ClassArray);
    let mut sim = Simulator::for_project(&class, &project).unwrap();
    for x in [-3, 0, 4, 5, 6] {
        let _ = sim.invoke("sign", "(I)I", &[x]).unwrap();
    }
    project.apply_hits();
    let counts = project
        .with_class("app.Sign", |data| {
            let jump = &data.line(1).unwrap().jumps()[0];
            (
                data.line(1).unwrap().hits(),
                data.line(2).unwrap().hits(),
                data.line(3).unwrap().hits(),
                jump.true_hits(),
                jump.false_hits(),
            )
        })
        .unwrap();
    assert_eq!(counts, (5, 3, 2, 2, 3));
}

#[test]
fn older_protocol_round_trip() {
    let (project, class) = instrument(CounterStorage::ClassArray);
    let mut sim = Simulator::for_project(&class, &project).unwrap();
    let _ = sim.invoke("sign", "(I)I", &[-1]).unwrap();
    project.apply_hits();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v3.bin");
    save(&project, &path, MIN_PROTOCOL_VERSION).unwrap();
    let report = load(&path);
    assert!(report.is_complete());
    let lines = report
        .project
        .with_class("app.Sign", |data| {
            data.lines().map(|l| (l.line_number(), l.hits())).collect::<Vec<_>>()
        })
        .unwrap();
    assert_eq!(lines, vec![(1, 1), (2, 0), (3, 1)]);
}

#[test]
fn truncated_file_keeps_partial_model() {
    let (project, class) = instrument(CounterStorage::ClassArray);
    let mut sim = Simulator::for_project(&class, &project).unwrap();
    let _ = sim.invoke("sign", "(I)I", &[2]).unwrap();
    project.apply_hits();

    let bytes = contar::io::encode(&project, CURRENT_PROTOCOL_VERSION).unwrap();
    let report = contar::io::decode(&bytes[..bytes.len() - 1]);
    assert!(!report.is_complete());
    assert!(matches!(report.error, Some(ContarError::Truncated { .. })));
}

#[test]
fn class_load_callback_instruments_once() {
    init_tracing();
    let project = Arc::new(ProjectData::new());
    let instrumenter = Instrumenter::new(Arc::clone(&project), InstrumentationConfig::default()).unwrap();
    let bytes = sign_class().to_bytes().unwrap();
    let out = instrumenter.transform("app.Sign", &bytes);
    assert_ne!(out, bytes);
    assert_eq!(instrumenter.transform("app.Sign", &bytes), bytes);
    assert_eq!(project.class_names(), vec!["app.Sign"]);
}

// ============================================================================
// Storage modes
// ============================================================================

#[test]
fn method_local_matches_class_array() {
    let run = |storage| {
        let (project, class) = instrument(storage);
        let mut sim = Simulator::for_project(&class, &project).unwrap();
        for x in -4..6 {
            let _ = sim.invoke("sign", "(I)I", &[x]).unwrap();
        }
        sim.hits().snapshot()
    };
    assert_eq!(run(CounterStorage::ClassArray), run(CounterStorage::MethodLocal));
}

#[test]
fn concurrent_invocations_lose_no_hits() {
    let (project, class) = instrument(CounterStorage::MethodLocal);
    let class = Arc::new(class);
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let class = Arc::clone(&class);
            let project = Arc::clone(&project);
            thread::spawn(move || {
                let mut sim = Simulator::for_project(&class, &project).unwrap();
                for _ in 0..250 {
                    let _ = sim.invoke("sign", "(I)I", &[1]).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    project.apply_hits();
    let line_1 = project
        .with_class("app.Sign", |data| data.line(1).map(LineData::hits))
        .flatten();
    assert_eq!(line_1, Some(1000));
}
