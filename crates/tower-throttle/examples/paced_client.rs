//! Paces a burst of calls through the throttle layer.
//!
//! Run with: cargo run --example paced_client

use std::time::Instant;
use tower::{Layer, Service, ServiceExt};
use tower_throttle::ThrottleConfig;

#[tokio::main]
async fn main() {
    let layer = ThrottleConfig::builder()
        .permits_per_second(5.0)
        .no_timeout()
        .name("paced-client")
        .on_permits_acquired(|wait| {
            if !wait.is_zero() {
                println!("  waited {:?} for a permit", wait);
            }
        })
        .build();

    let service = tower::service_fn(|i: u32| async move {
        Ok::<_, std::convert::Infallible>(format!("response {}", i))
    });
    let mut service = layer.layer(service);

    let start = Instant::now();
    for i in 0..10 {
        let response = service.ready().await.unwrap().call(i).await.unwrap();
        println!("{} at {:.2?}", response, start.elapsed());
    }
}
