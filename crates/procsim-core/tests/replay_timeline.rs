use procsim_core::cache::StateCache;
use procsim_core::card::{CreationGate, GateChange};
use procsim_core::timeline::{reconstruct, AxisLayout, IntervalStyle, Timeline};
use procsim_core::wire::{FrameDecoder, PushEvent};
use procsim_core::ProcessState;

const LAYOUT: AxisLayout = AxisLayout {
    width: 212.0,
    label_width: 10.0,
    right_margin: 2.0,
};

fn session_log() -> &'static str {
    r#"{"event":"update_process","data":{"id":1,"state":"Nuevo","totalWork":9,"executedWork":0,"lastBurstDurationMs":0,"history":[[1000.0,"Nuevo"]]}}
{"event":"update_process","data":{"id":2,"state":"Nuevo","totalWork":12,"executedWork":0,"lastBurstDurationMs":0,"history":[[1001.0,"Nuevo"]]}}
{"event":"update_process","data":{"id":1,"state":"Listo","totalWork":9,"executedWork":0,"lastBurstDurationMs":0,"history":[[1000.0,"Nuevo"],[1002.0,"Listo"]]}}
{"event":"update_process","data":{"id":1,"state":"En Ejecución","totalWork":9,"executedWork":0,"lastBurstDurationMs":0,"history":[[1000.0,"Nuevo"],[1002.0,"Listo"],[1003.0,"En Ejecución"]]}}
this line is not json
{"event":"update_process","data":{"id":2,"state":"Listo","totalWork":12,"executedWork":0,"lastBurstDurationMs":0,"history":[[1001.0,"Nuevo"],[1004.0,"Listo"]]}}
{"event":"update_process","data":{"id":1,"state":"Bloqueado","totalWork":9,"executedWork":4,"lastBurstDurationMs":4000,"history":[[1000.0,"Nuevo"],[1002.0,"Listo"],[1003.0,"En Ejecución"],[1007.0,"Bloqueado"]]}}
"#
}

fn replay(cache: &mut StateCache, gate: &mut CreationGate, input: &str) -> (usize, Vec<GateChange>) {
    let mut decoder = FrameDecoder::<PushEvent>::default();
    let mut decoded = decoder.feed(input.as_bytes());
    let tail = decoder.finish();
    decoded.frames.extend(tail.frames);
    decoded.errors.extend(tail.errors);

    let mut changes = Vec::new();
    for event in decoded.frames {
        match event {
            PushEvent::UpdateProcess(snapshot) => {
                cache.apply_update(snapshot).expect("valid snapshot");
                changes.extend(gate.observe(cache.len()));
            }
            PushEvent::FinalizeProcess(snapshot) => {
                cache.apply_finalize(snapshot).expect("valid snapshot");
            }
            PushEvent::Reset => {
                cache.reset();
                changes.extend(gate.reset());
            }
        }
    }
    (decoded.errors.len(), changes)
}

#[test]
fn recorded_session_rebuilds_cards_and_timeline() {
    let mut cache = StateCache::new();
    let mut gate = CreationGate::new(2);
    let (errors, changes) = replay(&mut cache, &mut gate, session_log());

    assert_eq!(errors, 1);
    assert_eq!(changes, vec![GateChange::CreationDisabled]);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(1).unwrap().snapshot.state, ProcessState::Blocked);

    let snapshots = cache.snapshot_all();
    let timeline = reconstruct(&snapshots, 1010.0, LAYOUT);
    let plot = timeline.plot().expect("two processes have transitions");

    assert_eq!(plot.start, 1000.0);
    assert_eq!(plot.end, 1010.0);
    assert_eq!(plot.duration, 10.0);
    assert_eq!(plot.pixels_per_second, 20.0);
    assert_eq!(plot.tick_spacing, 2.0);
    assert_eq!(plot.ticks.len(), 6);

    let first: Vec<_> = plot.rows[0]
        .intervals
        .iter()
        .map(|interval| (interval.style, interval.start, interval.end))
        .collect();
    assert_eq!(
        first,
        vec![
            (IntervalStyle::Dashed, 1002.0, 1003.0),
            (IntervalStyle::Solid, 1003.0, 1007.0),
            (IntervalStyle::Narrow, 1007.0, 1010.0),
        ]
    );
    let blocked = plot.rows[0].intervals[2];
    assert_eq!((blocked.x0, blocked.x1), (150.0, 210.0));

    assert_eq!(plot.rows[1].process_id, 2);
    assert_eq!(plot.rows[1].intervals.len(), 1);
    assert_eq!(plot.rows[1].intervals[0].end, 1010.0);
}

#[test]
fn finalize_then_reset_clears_timeline() {
    let mut cache = StateCache::new();
    let mut gate = CreationGate::new(2);
    replay(&mut cache, &mut gate, session_log());

    let finish = r#"{"event":"finalize_process","data":{"id":1,"state":"Finalizado","totalWork":9,"executedWork":9,"lastBurstDurationMs":1200,"history":[[1000.0,"Nuevo"],[1002.0,"Listo"],[1003.0,"En Ejecución"],[1007.0,"Bloqueado"],[1012.0,"Finalizado"]]}}
{"event":"finalize_process","data":{"id":2,"state":"Detenido","totalWork":12,"executedWork":0,"lastBurstDurationMs":0,"history":[[1001.0,"Nuevo"],[1004.0,"Listo"],[1009.0,"Detenido"]]}}"#;
    replay(&mut cache, &mut gate, finish);

    let snapshots = cache.snapshot_all();
    let frozen = reconstruct(&snapshots, 5000.0, LAYOUT);
    assert_eq!(frozen.plot().map(|plot| plot.end), Some(1012.0));
    assert!(cache.entries().all(|entry| entry.finalized));

    let (_, changes) = replay(&mut cache, &mut gate, "{\"event\":\"reset_ui\"}\n");
    assert_eq!(changes, vec![GateChange::CreationEnabled]);
    assert!(cache.is_empty());
    assert_eq!(reconstruct(&cache.snapshot_all(), 5000.0, LAYOUT), Timeline::Empty);
}
