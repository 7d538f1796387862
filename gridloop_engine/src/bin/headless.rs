use gridloop_engine::params::{
    track_param, PARAM_CLOCK_BUS, PARAM_GENERATE, PARAM_GEN_DENSITY, PARAM_GEN_TIES,
    PARAM_REC_DIVISION, PARAM_RUN_BUS, TRACK_ENABLED, TRACK_HUMANIZE, TRACK_LENGTH,
};
use gridloop_engine::{Engine, MidiSender};

struct StdoutMidi;

impl MidiSender for StdoutMidi {
    fn send_midi(&mut self, destination: u32, status: u8, data1: u8, data2: u8) {
        println!(
            "[MIDI] dest={:#06b} status={:#04X} data1={:3} data2={:3}",
            destination, status, data1, data2
        );
    }
}

const FRAMES: usize = 64;
const SAMPLE_RATE: f32 = 48_000.0;

fn run_block(engine: &mut Engine, gate: f32, clock: f32, out: &mut StdoutMidi) {
    // Two buses, non-interleaved: bus 1 carries the run gate, bus 2 the clock
    let mut bus_frames = [0.0f32; 2 * FRAMES];
    for i in 0..FRAMES {
        bus_frames[i] = gate;
        bus_frames[FRAMES + i] = clock;
    }
    engine.process_block(&bus_frames, FRAMES, SAMPLE_RATE, out);
}

fn main() -> Result<(), anyhow::Error> {
    println!("[Headless] Starting demo runner...");
    let mut engine = Engine::new(2)?;
    let mut out = StdoutMidi;

    // Route CV: bus 1 = run gate, bus 2 = clock
    engine.set_parameter(PARAM_RUN_BUS, 1);
    engine.set_parameter(PARAM_CLOCK_BUS, 2);

    // Track 1: 16 steps on a 4-step grid, dense generated pattern
    engine.set_parameter(track_param(0, TRACK_ENABLED), 1);
    engine.set_parameter(track_param(0, TRACK_LENGTH), 16);
    engine.set_parameter(track_param(0, TRACK_HUMANIZE), 10);
    engine.set_parameter(PARAM_REC_DIVISION, 2);
    engine.set_parameter(PARAM_GEN_DENSITY, 80);
    engine.set_parameter(PARAM_GEN_TIES, 30);

    println!("[Headless] Generating a pattern on track 1...");
    engine.set_parameter(PARAM_GENERATE, 1);
    run_block(&mut engine, 0.0, 0.0, &mut out);
    engine.set_parameter(PARAM_GENERATE, 0);

    println!("[Headless] Running 32 clock ticks...");
    run_block(&mut engine, 5.0, 0.0, &mut out); // gate rising: transport start
    for _ in 0..32 {
        run_block(&mut engine, 5.0, 5.0, &mut out);
        run_block(&mut engine, 5.0, 0.0, &mut out);
    }

    println!("[Headless] Stopping transport...");
    run_block(&mut engine, 0.0, 0.0, &mut out);

    println!("[Headless] Done.");
    Ok(())
}
