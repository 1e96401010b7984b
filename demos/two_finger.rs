use contact_ik::{
    homogeneous, solve_contacts, ContactTarget, HandModel, JointTarget, Memoized, MultiBody,
    SolverConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let multi_body = MultiBody::from_urdf(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/demos/urdf/two_finger.urdf"
    ))?;
    let model = HandModel::new(multi_body)
        .with_finger("finger0", "palm", "finger0_distal")?
        .with_finger("finger1", "palm", "finger1_distal")?;
    let hand = model.hand_description([0., 0., 0.04], [0., 0., 0., 1.]);
    let oracle = Memoized::new(model);

    let contact = homogeneous([0., 0.04, 0.]);
    let mut target = JointTarget::new(vec![0.; hand.dof]);
    // the last pair is out of reach and leaves the target where it was
    for goals in [
        [[-0.04, 0.075], [0.04, 0.075]],
        [[-0.02, 0.07], [0.02, 0.07]],
        [[-0.3, 0.3], [0.3, 0.3]],
    ] {
        let targets = [
            ContactTarget::new("finger0", contact, goals[0]),
            ContactTarget::new("finger1", contact, goals[1]),
        ];
        let start = target.get().to_vec();
        let outcome = solve_contacts(
            &hand,
            &oracle,
            &targets,
            &start,
            SolverConfig::default().max_passes(100),
        )?;
        let moved = target.update_all(&hand, &outcome)?;
        println!(
            "goals {goals:?}: {moved} finger(s) moved, target {:.4?}, cache hits {}",
            target.get(),
            oracle.hits()
        );
    }
    Ok(())
}
