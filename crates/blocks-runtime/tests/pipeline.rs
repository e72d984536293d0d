use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use blocks_runtime::{BlocksConfig, BlocksError, Message, Queue, Service, Time, Worker};
use serde_json::{json, Value};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn simulated_work(payload: &Value) -> Value {
    let millis = payload["duration_ms"].as_u64().unwrap_or(0);
    let deadline = Instant::now() + Duration::from_millis(millis);
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
    json!({ "task": payload["task"], "duration_ms": millis })
}

fn route_to_worker(queue: &Queue, worker: &Arc<Worker>, message_type: &str) {
    let worker = worker.clone();
    queue.subscribe(message_type, move |message: &Message| {
        let id = worker.submit_job(&message.message_type, message.payload.clone())?;
        Ok::<_, BlocksError>(json!({ "job_id": id.to_string() }))
    });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn service_blocks_while_queue_and_worker_return_immediately() {
    let service = Service::new("blocking_api");
    service.register("/process_image", |payload| {
        Ok::<_, String>(simulated_work(payload.unwrap_or(&Value::Null)))
    });

    let started = Instant::now();
    let response = service
        .handle_request(
            "/process_image",
            Some(json!({"task": "Process Image", "duration_ms": 100})),
        )
        .unwrap();
    assert!(response.is_success());
    assert!(started.elapsed() >= Duration::from_millis(100));

    let queue = Queue::new("task_queue");
    let worker = Arc::new(Worker::new("async_worker"));
    worker.register_job_type("process_image", |payload: &Value| {
        Ok::<_, String>(simulated_work(payload))
    });
    route_to_worker(&queue, &worker, "process_image");
    worker.start().unwrap();

    let started = Instant::now();
    assert!(queue.enqueue(
        "process_image",
        json!({"task": "Process Image", "duration_ms": 100})
    ));
    assert!(started.elapsed() < Duration::from_millis(100));

    timeout(WAIT, worker.wait_idle()).await.unwrap();
    worker.stop().await;
    queue.stop();

    assert_eq!(queue.get_stats().total_processed, 1);
    let stats = worker.get_stats();
    assert_eq!(stats.completed_jobs, 1);
    assert_eq!(
        worker.completed_jobs()[0].result_field("task"),
        Some(&json!("Process Image"))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn queue_dispatch_failures_are_isolated_from_worker() {
    let queue = Queue::new("resilient_queue");
    let worker = Arc::new(Worker::new("resilient_worker"));
    worker.register_job_type("send_email", |payload: &Value| {
        if payload["to"].is_null() {
            return Err("missing recipient".to_string());
        }
        Ok(json!({"sent": true}))
    });
    route_to_worker(&queue, &worker, "send_email");
    // subscriber whose worker never learned the job type
    route_to_worker(&queue, &worker, "generate_report");
    worker.start().unwrap();

    assert!(queue.enqueue("send_email", json!({"to": "a@example.com"})));
    assert!(queue.enqueue("send_email", json!({})));
    assert!(!queue.enqueue("generate_report", json!({})));
    assert!(!queue.enqueue("update_database", json!({})));

    timeout(WAIT, worker.wait_idle()).await.unwrap();
    worker.stop().await;

    let queue_stats = queue.get_stats();
    assert_eq!(queue_stats.total_processed, 3);
    assert_eq!(queue_stats.total_failed, 2);
    assert_eq!(queue_stats.active_subscribers, 2);

    let worker_stats = worker.get_stats();
    assert_eq!(worker_stats.completed_jobs, 1);
    assert_eq!(worker_stats.failed_jobs, 1);
    assert_eq!(worker_stats.total_jobs, 2);
    assert_eq!(
        worker.failed_jobs()[0].error.as_deref(),
        Some("missing recipient")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_queue_fans_out_to_several_workers() {
    let queue = Queue::new("multi_queue");
    let workers: Vec<Arc<Worker>> = (1..=3)
        .map(|i| {
            let worker = Arc::new(Worker::new(format!("worker_{}", i)));
            worker.register_job_type("task", |payload: &Value| {
                thread::sleep(Duration::from_millis(20));
                Ok::<_, String>(payload.clone())
            });
            worker.start().unwrap();
            worker
        })
        .collect();

    let next = Arc::new(AtomicUsize::new(0));
    let pool = workers.clone();
    queue.subscribe("task", move |message: &Message| {
        let worker = &pool[next.fetch_add(1, Ordering::SeqCst) % pool.len()];
        worker.submit_job("task", message.payload.clone())?;
        Ok::<_, BlocksError>(json!({"worker": worker.name()}))
    });

    for i in 0..9 {
        assert!(queue.enqueue("task", json!({ "i": i })));
    }

    for worker in &workers {
        timeout(WAIT, worker.wait_idle()).await.unwrap();
        worker.stop().await;
        assert_eq!(worker.get_stats().completed_jobs, 3);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn time_triggers_flow_through_queue_to_worker() {
    let worker = Arc::new(Worker::new("e_commerce_processor"));
    worker.register_job_type("process_sales", |payload: &Value| {
        Ok::<_, String>(json!({ "domain": payload["domain"] }))
    });

    let queue = Arc::new(Queue::new("sales_queue"));
    route_to_worker(&queue, &worker, "process_sales");

    let time = Time::new("business_scheduler");
    for (domain, interval) in [("ANALYTICS", 100), ("COMPLIANCE", 300)] {
        let queue = queue.clone();
        time.recurring_trigger(Duration::from_millis(interval), Duration::ZERO, move || {
            queue.enqueue("process_sales", json!({ "domain": domain }));
        })
        .unwrap();
    }

    worker.start().unwrap();
    time.start_time_monitoring().unwrap();

    tokio::time::sleep(Duration::from_millis(650)).await;

    time.stop_time_monitoring().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    worker.stop().await;

    let by_domain = worker.group_completed_by(|job| {
        job.result_field("domain")
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    let analytics_jobs = by_domain.get("ANALYTICS").map_or(0, Vec::len);
    let compliance_jobs = by_domain.get("COMPLIANCE").map_or(0, Vec::len);

    assert!(analytics_jobs >= 5, "analytics ran {} times", analytics_jobs);
    assert!((2..=4).contains(&compliance_jobs), "compliance ran {} times", compliance_jobs);

    let queue_stats = queue.get_stats();
    let worker_stats = worker.get_stats();
    assert_eq!(queue_stats.total_failed, 0);
    assert_eq!(queue_stats.total_processed, time.get_stats().total_fires);
    assert_eq!(worker_stats.total_jobs, queue_stats.total_processed);
    assert_eq!(worker_stats.completed_jobs + worker_stats.failed_jobs, worker_stats.total_jobs);
    assert_eq!(worker_stats.pending_jobs, 0);
}

#[tokio::test]
async fn blocks_built_from_config() {
    let config = BlocksConfig::parse_toml(
        r#"
        [service]
        name = "api"

        [queue]
        name = "jobs"

        [worker]
        name = "nightly"
        shutdown = "discard"

        [time]
        name = "cron"
        missed_fire = "skip"
        "#,
    )
    .unwrap();

    let service = Service::with_config(config.service);
    let queue = Queue::with_config(config.queue);
    let worker = Worker::with_config(config.worker);
    let time = Time::with_config(config.time);

    assert_eq!(service.name(), "api");
    assert_eq!(queue.name(), "jobs");
    assert_eq!(worker.name(), "nightly");
    assert_eq!(time.name(), "cron");
}
