use blockpick::motion::sim::SimulatedArm;
use blockpick::{ActionRequest, ColorTargets, SessionConfig};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let mut session = SessionConfig::default();
    session.sync.poll_interval_s = 0.01;
    session.plans = session.plans.without_settles();

    let mut targets = ColorTargets::new();
    targets.insert("red".to_string(), vec![[160.0, -40.0, -105.0]]);
    let request = ActionRequest::pick(Some("red"), targets);

    let mut gate = session.build_gate(SimulatedArm::new());
    for action in ["place", "pick", "pick", "place"] {
        let outcome = gate.execute(action, &request)?;
        println!(
            "{action:<6} -> {:?}: {} [{}]",
            outcome.status, outcome.message, outcome.state
        );
    }
    println!("{} arm commands issued.", gate.arm().commands().len());
    Ok(())
}
