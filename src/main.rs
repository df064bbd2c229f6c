use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() {
    if let Err(e) = rmon_cli::run() {
        rmon_runtime::ui::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
