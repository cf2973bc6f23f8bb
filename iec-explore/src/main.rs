fn main() -> anyhow::Result<()> {
    iec_explore::commands::entrypoint()
}
