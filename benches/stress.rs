use std::time::{Duration, Instant};

use tokio_postgres::{Config, NoTls};
use ulid::Ulid;

async fn connect(host: &str, port: u16, db: &str) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname(db)
        .user("turno")
        .password("turno");

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

/// Professional open every day 00:00–23:30 with a 30-minute service on a
/// paid plan, so the bench never trips the free-tier cap.
async fn seed(client: &tokio_postgres::Client) -> (Ulid, Ulid) {
    let pid = Ulid::new();
    let svc = Ulid::new();
    client
        .batch_execute("UPDATE practice SET plan = 'plus', status = 'active'")
        .await
        .unwrap();
    client
        .batch_execute(&format!(
            "INSERT INTO professionals (id, name, timezone) VALUES ('{pid}', 'Bench', 'America/Toronto')"
        ))
        .await
        .unwrap();
    client
        .batch_execute(&format!(
            "INSERT INTO services (id, professional_id, name, duration) VALUES ('{svc}', '{pid}', NULL, 30)"
        ))
        .await
        .unwrap();
    for weekday in ["mon", "tue", "wed", "thu", "fri", "sat", "sun"] {
        client
            .batch_execute(&format!(
                r#"INSERT INTO schedules (id, professional_id, weekday, start, "end") VALUES ('{}', '{pid}', '{weekday}', '00:00', '23:30')"#,
                Ulid::new()
            ))
            .await
            .unwrap();
    }
    (pid, svc)
}

fn booking_sql(pid: Ulid, svc: Ulid, day: u32, slot: u32) -> String {
    let (h, m) = (slot / 2, (slot % 2) * 30);
    format!(
        "INSERT INTO appointments (id, professional_id, service_id, patient_id, start) VALUES ('{}', '{pid}', '{svc}', '{}', '2026-06-{day:02} {h:02}:{m:02}')",
        Ulid::new(),
        Ulid::new()
    )
}

async fn phase1_sequential_bookings(host: &str, port: u16) {
    let client = connect(host, port, &format!("bench_{}", Ulid::new())).await;
    let (pid, svc) = seed(&client).await;

    let mut latencies = Vec::new();
    let start = Instant::now();
    let mut n = 0usize;
    for day in 1..=28 {
        for slot in 0..46 {
            let t = Instant::now();
            client.batch_execute(&booking_sql(pid, svc, day, slot)).await.unwrap();
            latencies.push(t.elapsed());
            n += 1;
        }
    }
    let elapsed = start.elapsed();
    println!(
        "  {} bookings in {:.2}s ({:.0}/s)",
        n,
        elapsed.as_secs_f64(),
        n as f64 / elapsed.as_secs_f64()
    );
    print_latency("sequential booking", &mut latencies);
}

async fn phase2_contended_slot(host: &str, port: u16) {
    let db = format!("bench_{}", Ulid::new());
    let client = connect(host, port, &db).await;
    let (pid, svc) = seed(&client).await;

    // 32 clients race for the same 20 slots; exactly 20 must win.
    let clients = 32usize;
    let mut handles = Vec::new();
    let start = Instant::now();
    for _ in 0..clients {
        let host = host.to_string();
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &db).await;
            let mut wins = 0usize;
            let mut losses = 0usize;
            for slot in 0..20 {
                match client.batch_execute(&booking_sql(pid, svc, 1, slot)).await {
                    Ok(_) => wins += 1,
                    Err(_) => losses += 1,
                }
            }
            (wins, losses)
        }));
    }

    let mut wins = 0usize;
    let mut losses = 0usize;
    for h in handles {
        let (w, l) = h.await.unwrap();
        wins += w;
        losses += l;
    }
    println!(
        "  contention: {wins} wins, {losses} conflicts in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    assert_eq!(wins, 20, "every slot must be won exactly once");
}

async fn phase3_availability_reads(host: &str, port: u16) {
    let client = connect(host, port, &format!("bench_{}", Ulid::new())).await;
    let (pid, svc) = seed(&client).await;
    for slot in 0..40 {
        client.batch_execute(&booking_sql(pid, svc, 8, slot)).await.unwrap();
    }

    let sql = format!(
        "SELECT * FROM availability WHERE professional_id = '{pid}' AND date = '2026-06-08' AND service_id = '{svc}'"
    );
    let mut latencies = Vec::new();
    for _ in 0..2000 {
        let t = Instant::now();
        let rows = client.simple_query(&sql).await.unwrap();
        latencies.push(t.elapsed());
        assert!(!rows.is_empty());
    }
    print_latency("availability query", &mut latencies);
}

#[tokio::main]
async fn main() {
    let host = std::env::var("TURNO_BENCH_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("TURNO_BENCH_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5433);

    println!("turno stress bench against {host}:{port}");
    println!("phase 1: sequential bookings");
    phase1_sequential_bookings(&host, port).await;
    println!("phase 2: contended slot");
    phase2_contended_slot(&host, port).await;
    println!("phase 3: availability reads");
    phase3_availability_reads(&host, port).await;
}
