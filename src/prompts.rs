//! Fixed prompt templates for the two chain stages.
//!
//! Arguments are spliced in verbatim; nothing is trimmed or escaped.

const PERSONA: &str = "You are a data analyst at a company. You are interacting with a user who is asking you questions about the company's database.";

/// Stage 1: question -> SQL.
pub fn sql_query_prompt(schema: &str, chat_history: &str, question: &str) -> String {
    format!(
        r#"{PERSONA}
Based on the table schema below, write a SQL query that would answer the user's question. Take the conversation history into account.

<SCHEMA>{schema}</SCHEMA>

Conversation History: {chat_history}

Write only the SQL query and nothing else. Do not wrap the SQL query in any other text, not even brackets.

For example:
Question: Which 3 products have the highest quantity in stock?
SQL Query: SELECT productName, quantityInStock from products order by quantityInStock desc limit 3;
Question: Which customers have placed orders with a total amount greater than 10,000?
SQL Query: SELECT c.customerNumber, c.customerName, SUM(od.quantityOrdered * od.priceEach) AS totalAmount FROM customers c JOIN orders o ON c.customerNumber = o.customerNumber JOIN orderdetails od ON o.orderNumber = od.orderNumber GROUP BY c.customerNumber, c.customerName HAVING totalAmount > 10000;

Your turn:

Question: {question}
SQL Query:"#
    )
}

/// Stage 2: SQL + result -> natural-language answer.
pub fn answer_prompt(
    schema: &str,
    chat_history: &str,
    query: &str,
    question: &str,
    response: &str,
) -> String {
    format!(
        r#"{PERSONA}
Based on the table schema below, question, sql query, and sql response, write a natural language response.
<SCHEMA>{schema}</SCHEMA>

Conversation History: {chat_history}
SQL Query: <SQL>{query}</SQL>
User Question: {question}
SQL Response: {response}"#
    )
}
