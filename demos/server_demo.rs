use oscquery::{MemoryComponent, MemoryObject, OscQueryServer, Quat, ServerBuilder, ServerConfig, Value, ValueType};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    let scene = MemoryObject::new("Scene");
    let light = MemoryObject::new("Root");
    let lamp = light.add_component(
        MemoryComponent::new("Light")
            .ranged("intensity", 1.0, 0.0, 8.0)
            .field("color", ValueType::Color, Value::Color([1.0, 1.0, 1.0, 1.0]))
            .enum_field("type", &["Spot", "Directional", "Point"], "Point")
            .action("Reset"),
    );
    light.add_component(
        MemoryComponent::new("Transform")
            .field("position", ValueType::Vec3, Value::Vec3([0.0, 2.0, 0.0]))
            .field("rotation", ValueType::Quaternion, Value::Rotation(Quat::IDENTITY)),
    );
    scene.add_child(light);

    let handle = OscQueryServer::from_builder(ServerBuilder::new().with_config(config).with_root(scene))
        .start()
        .await?;
    tracing::info!("listening on {:?}", handle.listening());

    // Host-side animation, so subscribers see feedback.
    let animate = tokio::spawn(async move {
        let mut phase = 0.0f32;
        loop {
            tokio::time::sleep(Duration::from_millis(100)).await;
            phase += 0.1;
            lamp.set_value("intensity", Value::Float(4.0 + 4.0 * phase.sin()));
        }
    });

    tokio::signal::ctrl_c().await?;
    animate.abort();
    handle.stop().await;
    Ok(())
}
