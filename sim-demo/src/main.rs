use anyhow::{bail, Context, Result};

use vmsim::config::Config;
use vmsim::mmu::Mmu;
use vmsim::workload::{RunControl, Workload, DEFAULT_STEPS};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!("usage: sim-demo <num-pages> <num-frames> <tlb-size> [processes] [steps]");
    }

    let num_pages = parse_count(&args[0], "number of pages")?;
    let num_frames = parse_count(&args[1], "number of frames")?;
    let tlb_size = parse_count(&args[2], "TLB size")?;
    let processes: u32 = match args.get(3) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("process count must be a number, got {raw:?}"))?,
        None => 1,
    };
    let steps = match args.get(4) {
        Some(raw) => parse_count(raw, "step count")?,
        None => DEFAULT_STEPS,
    };

    let config = Config::new(num_pages, num_frames, tlb_size)?;
    let mmu = Mmu::new(config);
    let control = RunControl::new();

    Workload::new(processes, steps).run(&mmu, &control);

    println!("{}", mmu.render_state());
    print_stats(&mmu);

    Ok(())
}

fn parse_count(raw: &str, what: &str) -> Result<usize> {
    raw.parse()
        .with_context(|| format!("{what} must be a number, got {raw:?}"))
}

fn print_stats(mmu: &Mmu) {
    let stats = mmu.stats();
    let global = stats.global();

    println!("Total References: {}", global.total_references());
    println!("TLB Miss Ratio: {:.2}", global.tlb_miss_ratio());
    println!("Page Fault Ratio: {:.2}", global.page_fault_ratio());
    println!("Disk Accesses: {}", global.disk_accesses());

    for (process_id, process) in stats.processes() {
        println!(
            "Process {process_id} References: {}",
            process.page_references()
        );
        println!(
            "Process {process_id} TLB Miss Ratio: {:.2}",
            process.tlb_miss_ratio()
        );
        println!(
            "Process {process_id} Page Fault Ratio: {:.2}",
            process.page_fault_ratio()
        );
        println!("Process {process_id} Status: {}", process.status());
    }
}
