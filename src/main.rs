fn main() -> anyhow::Result<()> {
    cgm_assistant_lib::run()
}
