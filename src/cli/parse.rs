use colored::Colorize;
use std::error::Error;

use tex_math::config::Config;
use tex_math::math_interpreter::{self, Environment};

/// Parse `expression` and print the AST tree.
pub fn parse(expression: &str, strict: bool, tree: bool) -> Result<(), Box<dyn Error>> {
    let config = Config::init();
    let mut options = config.to_options().map_err(render)?;
    if strict {
        options.strict = true;
    }

    let env = Environment::new();
    let ast = math_interpreter::parse(&options, expression, &env).map_err(render)?;
    if tree {
        println!("{}", ast);
    }
    Ok(())
}

/// Quiet variant for scripting; the exit status carries the answer.
pub fn check(expression: &str) -> Result<(), Box<dyn Error>> {
    let config = Config::init();
    let options = config.to_options().map_err(render)?;
    let env = Environment::new();
    match math_interpreter::parse(&options, expression, &env) {
        Ok(_) => {
            println!("{}", "OK".green());
            Ok(())
        }
        Err(e) => Err(render(e)),
    }
}

fn render(e: math_interpreter::ParseError) -> Box<dyn Error> {
    eprint!("{}", e.render());
    Box::new(e)
}
